pub mod game;
pub mod leaderboard;
pub mod net;
pub mod notification;
pub mod player;
pub mod problem;
pub mod room;
pub mod submission;
pub mod tester;
pub mod time;
pub mod user;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::future::BoxFuture;
    use uuid::Uuid;

    use crate::player::PlayerCode;
    use crate::problem::{Difficulty, Language, Problem, TestCase};
    use crate::room::{Room, RoomSettings, generate_room_code};
    use crate::submission::{Submission, SubmissionResult};
    use crate::tester::{TestCaseResult, TesterClient, TesterError, TesterRequest, TesterResponse};
    use crate::user::User;

    /// Create a connected user with the given nickname.
    pub fn make_user(nickname: &str) -> User {
        User::new(nickname)
    }

    /// Create a lobby room hosted by "Player1" with `n` members total.
    pub fn make_room(n: usize) -> Room {
        let mut room = Room::new(
            generate_room_code(),
            make_user("Player1"),
            RoomSettings::default(),
        );
        for i in 1..n {
            room.add_user(make_user(&format!("Player{}", i + 1)));
        }
        room
    }

    /// Create a problem with `num_cases` visible test cases.
    pub fn make_problem(num_cases: usize) -> Problem {
        Problem {
            problem_id: Uuid::new_v4(),
            name: "Sum Two Numbers".to_string(),
            description: "Read two integers and print their sum.".to_string(),
            difficulty: Difficulty::Easy,
            test_cases: (0..num_cases)
                .map(|i| TestCase {
                    input: format!("{i} {i}"),
                    expected_output: format!("{}", i * 2),
                    hidden: false,
                })
                .collect(),
        }
    }

    /// Create a scored submission for `problem_index` with the given verdict
    /// counts and start time.
    pub fn make_submission(
        problem_index: usize,
        num_correct: u32,
        num_test_cases: u32,
        start_time: u64,
    ) -> Submission {
        let results = (0..num_test_cases)
            .map(|i| SubmissionResult {
                console: String::new(),
                user_output: format!("{}", i * 2),
                error: String::new(),
                correct_output: format!("{}", i * 2),
                correct: i < num_correct,
                hidden: false,
            })
            .collect();
        Submission {
            player_code: PlayerCode::new("print(a + b)", Language::Python),
            problem_index,
            results,
            start_time,
            num_correct,
            num_test_cases,
            runtime_millis: Some(1.0),
            compilation_error: None,
        }
    }

    /// Tester verdict with every case passing.
    pub fn passing_response(num_cases: u32) -> TesterResponse {
        TesterResponse {
            results: (0..num_cases)
                .map(|i| TestCaseResult {
                    console: String::new(),
                    user_output: format!("{}", i * 2),
                    error: String::new(),
                    correct_output: format!("{}", i * 2),
                    correct: true,
                    hidden: false,
                })
                .collect(),
            num_correct: num_cases,
            num_test_cases: num_cases,
            runtime_millis: Some(1.0),
            compilation_error: None,
        }
    }

    /// Tester verdict with every case failing.
    pub fn failing_response(num_cases: u32) -> TesterResponse {
        TesterResponse {
            results: (0..num_cases)
                .map(|i| TestCaseResult {
                    console: String::new(),
                    user_output: "wrong".to_string(),
                    error: String::new(),
                    correct_output: format!("{}", i * 2),
                    correct: false,
                    hidden: false,
                })
                .collect(),
            num_correct: 0,
            num_test_cases: num_cases,
            runtime_millis: Some(1.0),
            compilation_error: None,
        }
    }

    /// In-memory tester double. Queued outcomes are served in order;
    /// once the queue drains every call gets the fallback verdict.
    pub struct CannedTester {
        queue: Mutex<VecDeque<Result<TesterResponse, TesterError>>>,
        fallback: TesterResponse,
    }

    impl CannedTester {
        pub fn passing(num_cases: u32) -> Self {
            Self {
                queue: Mutex::new(VecDeque::new()),
                fallback: passing_response(num_cases),
            }
        }

        pub fn failing(num_cases: u32) -> Self {
            Self {
                queue: Mutex::new(VecDeque::new()),
                fallback: failing_response(num_cases),
            }
        }

        /// Queue an outcome to be served before the fallback kicks in.
        pub fn enqueue(&self, outcome: Result<TesterResponse, TesterError>) {
            self.queue.lock().unwrap().push_back(outcome);
        }
    }

    impl TesterClient for CannedTester {
        fn evaluate(
            &self,
            _request: TesterRequest,
        ) -> BoxFuture<'_, Result<TesterResponse, TesterError>> {
            let outcome = self
                .queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()));
            Box::pin(async move { outcome })
        }
    }
}
