//! 会话存储模块
//! 进程内会话表，粗粒度互斥锁保护，不做跨重启持久化

use crate::errors::{AppError, Result};
use crate::models::{AnswerRecord, QuestionRecord, Session};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 会话存储服务
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建会话并生成不透明标识
    pub fn create(
        &self,
        subject: String,
        topic: String,
        key_points: Vec<String>,
        questions: Vec<QuestionRecord>,
    ) -> Session {
        let session = Session {
            session_id: new_session_id(),
            subject,
            topic,
            key_points,
            questions,
            answers: Vec::new(),
            current_index: 0,
            created_at: chrono::Utc::now(),
        };

        let mut sessions = self.sessions.lock().expect("session map lock poisoned");
        sessions.insert(session.session_id.clone(), session.clone());
        session
    }

    /// 按标识取会话快照
    pub fn get(&self, session_id: &str) -> Result<Session> {
        let sessions = self.sessions.lock().expect("session map lock poisoned");
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }

    /// 追加作答并推进游标
    /// 下标校验失败不产生任何状态变更；锁内完成读改写，游标保持单调不减
    pub fn append_answer(&self, session_id: &str, answer: AnswerRecord) -> Result<Session> {
        let mut sessions = self.sessions.lock().expect("session map lock poisoned");
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        if answer.question_index >= session.questions.len() {
            return Err(AppError::BadRequest("Invalid question index".to_string()));
        }

        session.current_index = session.current_index.max(answer.question_index + 1);
        session.answers.push(answer);
        Ok(session.clone())
    }

    /// 活跃会话数
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session map lock poisoned").len()
    }
}

fn new_session_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("session_{}", &hex[..8])
}

/// 已答题目平均分，保留两位小数，未作答时为 0
pub fn average_score(session: &Session) -> f64 {
    if session.answers.is_empty() {
        return 0.0;
    }
    let total: i64 = session.answers.iter().map(|a| a.grade.score).sum();
    let mean = total as f64 / session.answers.len() as f64;
    (mean * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GradeResult;

    fn store_with_session(question_count: usize) -> (SessionStore, String) {
        let store = SessionStore::new();
        let questions = (0..question_count)
            .map(|i| QuestionRecord {
                question: format!("question {}", i),
                expected_answer: vec!["a point".to_string()],
                keywords: vec!["kw".to_string()],
            })
            .collect();
        let session = store.create(
            "OS".to_string(),
            "Processes".to_string(),
            vec!["scheduling".to_string()],
            questions,
        );
        (store, session.session_id)
    }

    fn answer(index: usize, score: i64) -> AnswerRecord {
        AnswerRecord {
            question_index: index,
            answer_text: "my answer".to_string(),
            grade: GradeResult {
                score,
                feedback: "ok".to_string(),
                missing_keywords: vec![],
            },
        }
    }

    #[test]
    fn test_create_and_get() {
        let (store, id) = store_with_session(3);
        let session = store.get(&id).unwrap();
        assert!(session.session_id.starts_with("session_"));
        assert_eq!(session.questions.len(), 3);
        assert_eq!(session.current_index, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_session_is_not_found() {
        let store = SessionStore::new();
        assert!(matches!(
            store.get("session_deadbeef"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_append_advances_cursor() {
        let (store, id) = store_with_session(3);
        let session = store.append_answer(&id, answer(0, 80)).unwrap();
        assert_eq!(session.current_index, 1);
        assert_eq!(session.answers.len(), 1);
    }

    #[test]
    fn test_cursor_is_monotonic() {
        let (store, id) = store_with_session(3);
        store.append_answer(&id, answer(2, 70)).unwrap();
        // 回头补答更早的题，游标不回退
        let session = store.append_answer(&id, answer(0, 90)).unwrap();
        assert_eq!(session.current_index, 3);
        assert_eq!(session.answers.len(), 2);
    }

    #[test]
    fn test_out_of_range_index_does_not_mutate() {
        let (store, id) = store_with_session(2);
        store.append_answer(&id, answer(0, 50)).unwrap();

        let result = store.append_answer(&id, answer(2, 50));
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let session = store.get(&id).unwrap();
        assert_eq!(session.answers.len(), 1);
        assert_eq!(session.current_index, 1);
    }

    #[test]
    fn test_average_score_zero_when_unanswered() {
        let (store, id) = store_with_session(2);
        let session = store.get(&id).unwrap();
        assert_eq!(average_score(&session), 0.0);
    }

    #[test]
    fn test_average_score_rounded_to_two_decimals() {
        let (store, id) = store_with_session(3);
        store.append_answer(&id, answer(0, 70)).unwrap();
        store.append_answer(&id, answer(1, 80)).unwrap();
        let session = store.append_answer(&id, answer(2, 90)).unwrap();
        assert_eq!(average_score(&session), 80.0);

        let (store, id) = store_with_session(3);
        store.append_answer(&id, answer(0, 70)).unwrap();
        store.append_answer(&id, answer(1, 70)).unwrap();
        let session = store.append_answer(&id, answer(2, 71)).unwrap();
        assert_eq!(average_score(&session), 70.33);
    }

    #[test]
    fn test_multiple_sessions_coexist() {
        let (store, _) = store_with_session(1);
        let other = store.create(
            "Math".to_string(),
            "Limits".to_string(),
            vec![],
            vec![QuestionRecord {
                question: "q".to_string(),
                expected_answer: vec![],
                keywords: vec![],
            }],
        );
        assert_eq!(store.len(), 2);
        assert!(other.session_id.starts_with("session_"));
    }
}
