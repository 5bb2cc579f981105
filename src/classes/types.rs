//! Class, enrollment, and material types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A class taught by one teacher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Six-character join code students enroll with
    pub code: String,
    pub teacher_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One student's enrollment in one class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub class_id: Uuid,
    pub student_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
}

/// A published study material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: Uuid,
    pub class_id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub video_url: Option<String>,
    pub video_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which publication window a recent-materials query was satisfied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialWindow {
    /// Materials published in the last 7 days
    LastWeek,
    /// Materials published in the last 14 days
    LastTwoWeeks,
    /// The latest materials regardless of age
    Latest,
}
