use codeclash_core::player::PlayerCode;
use codeclash_core::submission::{Submission, SubmissionResult};
use codeclash_core::tester::TesterResponse;

/// Fold a tester verdict into a scored submission. A compilation error
/// zeroes the score and fails every case regardless of what the tester
/// reported per-case.
pub fn build_submission(
    code: PlayerCode,
    problem_index: usize,
    start_time: u64,
    response: TesterResponse,
) -> Submission {
    let compile_failed = response.compilation_error.is_some();
    let results: Vec<SubmissionResult> = response
        .results
        .into_iter()
        .map(|r| SubmissionResult {
            console: r.console,
            user_output: r.user_output,
            error: r.error,
            correct_output: r.correct_output,
            correct: r.correct && !compile_failed,
            hidden: r.hidden,
        })
        .collect();
    Submission {
        player_code: code,
        problem_index,
        results,
        start_time,
        num_correct: if compile_failed {
            0
        } else {
            response.num_correct
        },
        num_test_cases: response.num_test_cases,
        runtime_millis: response.runtime_millis,
        compilation_error: response.compilation_error,
    }
}
