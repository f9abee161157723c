// 服务模块
// 提供核心业务逻辑服务

pub mod extract;
pub mod ollama;
pub mod quiz;
pub mod session;

pub use extract::{extract_json, scan_objects, strip_code_fence, TargetShape};
pub use ollama::{OllamaClient, OllamaConfig};
pub use quiz::{normalize_count, repair_grade, QuizPrompt, QuizService};
pub use session::{average_score, SessionStore};
