//! HTTP 接口模块
//! 提供给前端调用的会话编排接口

use crate::errors::{AppError, Result};
use crate::models::AnswerRecord;
use crate::services::{average_score, QuizService, SessionStore};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub quiz: QuizService,
    pub store: SessionStore,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub subject: String,
    pub topic: String,
    pub key_points: Vec<String>,
    pub question_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub total_questions: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub session_id: String,
    pub question_index: usize,
    pub answer_text: String,
}

/// 创建会话并生成试题
/// POST /create_session
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>> {
    if request.question_count == 0 {
        return Err(AppError::BadRequest(
            "question_count must be at least 1".to_string(),
        ));
    }

    let questions = state
        .quiz
        .generate_questions(
            &request.subject,
            &request.topic,
            &request.key_points,
            request.question_count,
        )
        .await?;

    let session = state.store.create(
        request.subject,
        request.topic,
        request.key_points,
        questions,
    );

    log::info!(
        "Created session {} with {} questions",
        session.session_id,
        session.questions.len()
    );

    Ok(Json(CreateSessionResponse {
        total_questions: session.questions.len(),
        session_id: session.session_id,
    }))
}

/// 取会话中的下一道题，答完返回完成标记
/// GET /next_question/:session_id
async fn next_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>> {
    let session = state.store.get(&session_id)?;
    let index = session.current_index;

    if index >= session.questions.len() {
        return Ok(Json(json!({
            "completed": true,
            "message": "All questions completed",
            "total_questions": session.questions.len(),
        })));
    }

    let question = &session.questions[index];
    Ok(Json(json!({
        "index": index,
        "question": question.question,
        "expected": question.expected_answer,
        "keywords": question.keywords,
        "total_questions": session.questions.len(),
    })))
}

/// 提交作答并评分
/// POST /submit_answer
async fn submit_answer(
    State(state): State<AppState>,
    Json(request): Json<SubmitAnswerRequest>,
) -> Result<Json<Value>> {
    // 评分前先完成全部校验，校验失败不改状态也不消耗推理调用
    let session = state.store.get(&request.session_id)?;
    let question = session
        .questions
        .get(request.question_index)
        .ok_or_else(|| AppError::BadRequest("Invalid question index".to_string()))?;

    let grade = state
        .quiz
        .grade_answer(
            &question.question,
            &question.expected_answer,
            &question.keywords,
            &request.answer_text,
        )
        .await?;

    let updated = state.store.append_answer(
        &request.session_id,
        AnswerRecord {
            question_index: request.question_index,
            answer_text: request.answer_text,
            grade: grade.clone(),
        },
    )?;

    Ok(Json(json!({
        "grade": grade,
        "question_index": request.question_index,
        "next_available": updated.current_index < updated.questions.len(),
    })))
}

/// 导出完整会话数据与统计
/// GET /session/:session_id
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>> {
    let session = state.store.get(&session_id)?;

    Ok(Json(json!({
        "session_id": session.session_id,
        "subject": session.subject,
        "topic": session.topic,
        "key_points": session.key_points,
        "total_questions": session.questions.len(),
        "answered": session.answers.len(),
        "average_score": average_score(&session),
        "questions": session.questions,
        "answers": session.answers,
        "current_index": session.current_index,
    })))
}

/// 存活探针
/// GET /
async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "message": "AI Viva Agent Backend",
        "active_sessions": state.store.len(),
    }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/create_session", post(create_session))
        .route("/next_question/:session_id", get(next_question))
        .route("/submit_answer", post(submit_answer))
        .route("/session/:session_id", get(get_session))
        .with_state(state)
}
