use serde::{Deserialize, Serialize};

/// 试题结构
/// 由结构化提取器从模型输出构造，入库后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question: String,
    /// 参考答案要点，通常 3-5 条（尽力而为，不强制）
    #[serde(default)]
    pub expected_answer: Vec<String>,
    /// 关键词，通常 3-6 个（尽力而为，不强制）
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// 评分结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeResult {
    /// 得分，固定落在 [0, 100]
    pub score: i64,
    pub feedback: String,
    pub missing_keywords: Vec<String>,
}

/// 作答记录，只追加不修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: usize,
    pub answer_text: String,
    pub grade: GradeResult,
}

/// 口试会话
/// questions 在创建时一次性写入且长度等于请求数量；
/// answers 只追加；current_index 单调不减
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub subject: String,
    pub topic: String,
    pub key_points: Vec<String>,
    pub questions: Vec<QuestionRecord>,
    pub answers: Vec<AnswerRecord>,
    pub current_index: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
