//! 出题与评分服务模块
//! 提示词工程 + 推理调用 + 结构化提取 + 结果修复

use crate::errors::{AppError, Result};
use crate::models::{GradeResult, QuestionRecord};
use crate::services::extract::{extract_json, TargetShape};
use crate::services::ollama::OllamaClient;
use serde_json::Value;

/// 评分缺省反馈语
const DEFAULT_FEEDBACK: &str = "Answer received and graded.";

/// 口试提示词工程
pub struct QuizPrompt;

impl QuizPrompt {
    /// 构建批量出题提示词，要求模型以 JSON 数组输出恰好 count 道题
    pub fn generate_questions(
        subject: &str,
        topic: &str,
        key_points: &[String],
        count: usize,
    ) -> String {
        let key_points_str = key_points.join(", ");

        format!(
            r#"Generate {count} exam questions as a JSON array.

Subject: {subject}
Topic: {topic}
Key concepts: {key_points_str}

Return a JSON array with {count} objects. Each object must have:
- question: the question text (string)
- expected_answer: array of 3-5 key points (array of strings)
- keywords: array of 3-6 keywords (array of strings)

Example:
[
  {{"question": "What is a process?", "expected_answer": ["A program in execution", "Has its own memory space", "Managed by the OS"], "keywords": ["process", "execution", "memory", "OS"]}},
  {{"question": "Explain context switching", "expected_answer": ["Saving process state", "Loading another process", "CPU switches between processes"], "keywords": ["context switch", "CPU", "process state"]}}
]

Generate {count} questions now as a JSON array:"#
        )
    }

    /// 构建评分提示词：题目、参考要点、关键词、学生作答与评分细则
    pub fn grade_answer(
        question: &str,
        expected_answer: &[String],
        keywords: &[String],
        student_answer: &str,
    ) -> String {
        let expected_str = expected_answer
            .iter()
            .map(|point| format!("- {}", point))
            .collect::<Vec<_>>()
            .join("\n");
        let keywords_str = keywords.join(", ");

        format!(
            r#"You are an exam grader. Compare the student's answer to the expected answer and keywords.

Question: {question}

Expected Answer Points:
{expected_str}

Important Keywords: {keywords_str}

Student's Answer:
{student_answer}

Evaluate the answer and return ONLY a JSON object with:
- "score": A number from 0 to 100 representing the answer quality
- "feedback": A 1-3 sentence constructive feedback (string)
- "missing_keywords": An array of important keywords that were missing from the answer (array of strings)

Scoring guide:
- 90-100: Excellent, covers all key points with correct keywords
- 70-89: Good, covers most points with minor gaps
- 50-69: Acceptable, covers some points but missing important concepts
- 30-49: Poor, major concepts missing
- 0-29: Inadequate, shows little understanding

Return ONLY the JSON object, no other text.

Example format:
{{
  "score": 72,
  "feedback": "Your answer correctly identifies the basic concept but lacks detail about atomic operations. Consider explaining how semaphores prevent race conditions.",
  "missing_keywords": ["atomic", "race condition"]
}}

Grade the answer now:"#
        )
    }
}

/// 规整题目数量到精确值
/// 不足时按下标模长循环复制补齐，超出时截断前 count 道
pub fn normalize_count(mut questions: Vec<QuestionRecord>, count: usize) -> Vec<QuestionRecord> {
    if questions.is_empty() {
        return questions;
    }

    if questions.len() < count {
        log::warn!(
            "Got {} questions, expected {}. Duplicating to reach target.",
            questions.len(),
            count
        );
        let base = questions.len();
        for i in base..count {
            questions.push(questions[i % base].clone());
        }
    } else if questions.len() > count {
        log::info!("Got {} questions, trimming to {}", questions.len(), count);
        questions.truncate(count);
    }

    questions
}

/// 修复评分对象：解析与修补分离，模型漏字段或越界值在此统一兜底
/// - score 取整并收敛到 [0, 100]，缺失按 0 处理
/// - feedback 缺失或为空时填缺省反馈
/// - missing_keywords 缺失时为空数组
pub fn repair_grade(value: &Value) -> GradeResult {
    let score = match &value["score"] {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
    .clamp(0, 100);

    let feedback = match value["feedback"].as_str() {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => DEFAULT_FEEDBACK.to_string(),
    };

    let missing_keywords = value["missing_keywords"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    GradeResult {
        score,
        feedback,
        missing_keywords,
    }
}

/// 出题与评分服务
#[derive(Clone)]
pub struct QuizService {
    ollama: OllamaClient,
}

impl QuizService {
    pub fn new(ollama: OllamaClient) -> Self {
        Self { ollama }
    }

    /// 生成恰好 count 道试题
    /// 提取结果为空或数量不符时分别报错/规整，保证数量不变式无条件成立
    pub async fn generate_questions(
        &self,
        subject: &str,
        topic: &str,
        key_points: &[String],
        count: usize,
    ) -> Result<Vec<QuestionRecord>> {
        let prompt = QuizPrompt::generate_questions(subject, topic, key_points, count);

        log::info!("Generating {} questions for {} - {}", count, subject, topic);
        let raw = self.ollama.generate(&prompt).await?;

        let value = extract_json(&raw, TargetShape::Array)
            .map_err(|e| AppError::extraction(format!("Error processing questions: {}", e), &raw))?;

        // 数组元素逐个反序列化，缺 question 字段等坏对象跳过
        let questions: Vec<QuestionRecord> = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .filter(|q: &QuestionRecord| !q.question.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if questions.is_empty() {
            return Err(AppError::extraction(
                "No valid question objects found in response",
                &raw,
            ));
        }

        log::info!("Successfully parsed {} questions", questions.len());
        Ok(normalize_count(questions, count))
    }

    /// 评分单次作答
    pub async fn grade_answer(
        &self,
        question: &str,
        expected_answer: &[String],
        keywords: &[String],
        student_answer: &str,
    ) -> Result<GradeResult> {
        let prompt = QuizPrompt::grade_answer(question, expected_answer, keywords, student_answer);

        let raw = self.ollama.generate(&prompt).await?;

        let value = extract_json(&raw, TargetShape::Object)
            .map_err(|e| AppError::extraction(format!("Error processing grade: {}", e), &raw))?;

        Ok(repair_grade(&value))
    }
}
