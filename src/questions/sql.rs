// src/questions/sql.rs

use async_trait::async_trait;
use sqlx::{
    FromRow, SqlitePool,
    sqlite::SqlitePoolOptions,
    types::Json,
};

use crate::{
    error::AppError,
    models::question::{Language, Question, validate_question_set},
    questions::QuestionBank,
};

/// Helper struct for reading rows of the 'questions' table.
#[derive(Debug, FromRow)]
struct QuestionRow {
    id: i64,
    question: String,
    /// Stored as a JSON array in the database.
    options: Json<Vec<String>>,
    answer: String,
    image: Option<String>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            question: row.question,
            options: row.options.0,
            answer: row.answer,
            image: row.image,
        }
    }
}

/// Question bank stored in SQLite.
#[derive(Debug, Clone)]
pub struct SqlQuestionBank {
    pool: SqlitePool,
}

impl SqlQuestionBank {
    /// Connects to `database_url` and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let bank = Self::new(pool);
        bank.migrate().await?;
        Ok(bank)
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run question bank migrations: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })
    }

    /// Inserts or replaces one question of a language's set.
    pub async fn upsert_question(
        &self,
        language: Language,
        position: i64,
        question: &Question,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO questions (id, language, position, question, options, answer, image)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(language, id) DO UPDATE SET
                position = excluded.position,
                question = excluded.question,
                options = excluded.options,
                answer = excluded.answer,
                image = excluded.image
            "#,
        )
        .bind(question.id)
        .bind(language.as_str())
        .bind(position)
        .bind(&question.question)
        .bind(Json(&question.options))
        .bind(&question.answer)
        .bind(&question.image)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for SqlQuestionBank {
    async fn questions(&self, language: Language) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, question, options, answer, image
            FROM questions
            WHERE language = ?
            ORDER BY position, id
            "#,
        )
        .bind(language.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch {} questions: {:?}", language, e);
            AppError::InternalServerError(e.to_string())
        })?;

        if rows.is_empty() {
            return Err(AppError::NotFound(format!(
                "No questions for language '{}'",
                language
            )));
        }

        let questions: Vec<Question> = rows.into_iter().map(Question::from).collect();
        validate_question_set(&questions).map_err(|e| {
            AppError::InternalServerError(format!("Invalid {} question set: {}", language, e))
        })?;
        Ok(questions)
    }
}
