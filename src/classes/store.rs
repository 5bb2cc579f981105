//! Class, enrollment, and material persistence.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::types::{Class, Enrollment, Material, MaterialWindow};

const CODE_LENGTH: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How many fresh codes to try before giving up on a collision run.
const CODE_ATTEMPTS: usize = 5;

/// How many materials the ultimate fallback window returns.
const LATEST_MATERIALS_LIMIT: u32 = 5;

/// Generate a six-character upper-alphanumeric join code.
pub fn generate_class_code() -> String {
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(CODE_LENGTH)
        .map(|b| CODE_ALPHABET[*b as usize % CODE_ALPHABET.len()] as char)
        .collect()
}

/// Validate join-code format: exactly six A-Z or 0-9 characters.
pub fn validate_class_code(code: &str) -> bool {
    code.len() == CODE_LENGTH
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Store for classes, enrollments, and materials.
pub struct ClassStore<'a> {
    conn: &'a Connection,
}

impl<'a> ClassStore<'a> {
    /// Create a new class store with a database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a class with a freshly generated join code.
    pub fn create_class(
        &self,
        name: &str,
        description: Option<&str>,
        teacher_id: Uuid,
    ) -> Result<Class, ClassError> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        for _ in 0..CODE_ATTEMPTS {
            let code = generate_class_code();
            let inserted = self.conn.execute(
                "INSERT OR IGNORE INTO classes (id, name, description, code, teacher_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.to_string(),
                    name,
                    description,
                    code,
                    teacher_id.to_string(),
                    now.to_rfc3339(),
                ],
            )?;

            // Zero rows means the code collided with an existing class
            if inserted == 1 {
                return Ok(Class {
                    id,
                    name: name.to_string(),
                    description: description.map(str::to_string),
                    code,
                    teacher_id,
                    created_at: now,
                    updated_at: now,
                });
            }
        }

        Err(ClassError::CodeGeneration)
    }

    /// Get a class by id.
    pub fn get_class(&self, class_id: Uuid) -> Result<Option<Class>, ClassError> {
        self.conn
            .query_row(
                "SELECT id, name, description, code, teacher_id, created_at, updated_at
                 FROM classes WHERE id = ?1",
                params![class_id.to_string()],
                parse_class_row,
            )
            .optional()
            .map_err(ClassError::from)
    }

    /// Look up a class by join code. Rejects malformed codes before
    /// touching the store.
    pub fn find_by_code(&self, code: &str) -> Result<Option<Class>, ClassError> {
        if !validate_class_code(code) {
            return Err(ClassError::InvalidCode(code.to_string()));
        }

        self.conn
            .query_row(
                "SELECT id, name, description, code, teacher_id, created_at, updated_at
                 FROM classes WHERE code = ?1",
                params![code],
                parse_class_row,
            )
            .optional()
            .map_err(ClassError::from)
    }

    /// Enroll a student in a class. Each student enrolls at most once.
    pub fn enroll_student(
        &self,
        class_id: Uuid,
        student_id: Uuid,
    ) -> Result<Enrollment, ClassError> {
        if self.get_class(class_id)?.is_none() {
            return Err(ClassError::NotFound(class_id));
        }

        let mut check_stmt = self.conn.prepare(
            "SELECT id FROM class_enrollments WHERE class_id = ?1 AND student_id = ?2",
        )?;
        if check_stmt.exists(params![class_id.to_string(), student_id.to_string()])? {
            return Err(ClassError::AlreadyEnrolled);
        }

        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            class_id,
            student_id,
            enrolled_at: Utc::now(),
        };

        self.conn.execute(
            "INSERT INTO class_enrollments (id, class_id, student_id, enrolled_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                enrollment.id.to_string(),
                enrollment.class_id.to_string(),
                enrollment.student_id.to_string(),
                enrollment.enrolled_at.to_rfc3339(),
            ],
        )?;

        Ok(enrollment)
    }

    /// Classes a student is enrolled in.
    pub fn classes_for_student(&self, student_id: Uuid) -> Result<Vec<Class>, ClassError> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, c.description, c.code, c.teacher_id, c.created_at, c.updated_at
             FROM classes c
             JOIN class_enrollments e ON c.id = e.class_id
             WHERE e.student_id = ?1
             ORDER BY e.enrolled_at DESC",
        )?;

        let rows = stmt.query_map(params![student_id.to_string()], parse_class_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(ClassError::from)
    }

    /// Classes taught by a teacher.
    pub fn classes_for_teacher(&self, teacher_id: Uuid) -> Result<Vec<Class>, ClassError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, code, teacher_id, created_at, updated_at
             FROM classes WHERE teacher_id = ?1
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![teacher_id.to_string()], parse_class_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(ClassError::from)
    }

    /// Publish a material to a class.
    pub fn publish_material(
        &self,
        class_id: Uuid,
        teacher_id: Uuid,
        title: &str,
        description: Option<&str>,
        content: &str,
        video_url: Option<&str>,
        video_type: Option<&str>,
    ) -> Result<Material, ClassError> {
        if self.get_class(class_id)?.is_none() {
            return Err(ClassError::NotFound(class_id));
        }

        let now = Utc::now();
        let material = Material {
            id: Uuid::new_v4(),
            class_id,
            teacher_id,
            title: title.to_string(),
            description: description.map(str::to_string),
            content: content.to_string(),
            video_url: video_url.map(str::to_string),
            video_type: video_type.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        self.conn.execute(
            "INSERT INTO materials (id, class_id, teacher_id, title, description, content, video_url, video_type, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                material.id.to_string(),
                material.class_id.to_string(),
                material.teacher_id.to_string(),
                material.title,
                material.description,
                material.content,
                material.video_url,
                material.video_type,
                now.to_rfc3339(),
            ],
        )?;

        Ok(material)
    }

    /// Materials for the quiz-generator collaborator, with widening
    /// windows: the last week, then the last two weeks, then the latest
    /// five regardless of age.
    pub fn recent_materials(
        &self,
        class_id: Uuid,
    ) -> Result<(Vec<Material>, MaterialWindow), ClassError> {
        let now = Utc::now();

        let last_week = self.materials_since(class_id, now - Duration::days(7))?;
        if !last_week.is_empty() {
            return Ok((last_week, MaterialWindow::LastWeek));
        }

        let last_two_weeks = self.materials_since(class_id, now - Duration::days(14))?;
        if !last_two_weeks.is_empty() {
            return Ok((last_two_weeks, MaterialWindow::LastTwoWeeks));
        }

        let latest = self.latest_materials(class_id, LATEST_MATERIALS_LIMIT)?;
        Ok((latest, MaterialWindow::Latest))
    }

    fn materials_since(
        &self,
        class_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Material>, ClassError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, class_id, teacher_id, title, description, content, video_url, video_type, created_at, updated_at
             FROM materials
             WHERE class_id = ?1 AND created_at >= ?2
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(
            params![class_id.to_string(), since.to_rfc3339()],
            parse_material_row,
        )?;

        rows.collect::<Result<Vec<_>, _>>().map_err(ClassError::from)
    }

    fn latest_materials(&self, class_id: Uuid, limit: u32) -> Result<Vec<Material>, ClassError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, class_id, teacher_id, title, description, content, video_url, video_type, created_at, updated_at
             FROM materials
             WHERE class_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![class_id.to_string(), limit], parse_material_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(ClassError::from)
    }
}

/// Parse a database row into a Class.
fn parse_class_row(row: &rusqlite::Row) -> rusqlite::Result<Class> {
    let id_str: String = row.get(0)?;
    let teacher_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;
    let updated_at_str: String = row.get(6)?;

    Ok(Class {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        name: row.get(1)?,
        description: row.get(2)?,
        code: row.get(3)?,
        teacher_id: Uuid::parse_str(&teacher_str).unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Parse a database row into a Material.
fn parse_material_row(row: &rusqlite::Row) -> rusqlite::Result<Material> {
    let id_str: String = row.get(0)?;
    let class_str: String = row.get(1)?;
    let teacher_str: String = row.get(2)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: String = row.get(9)?;

    Ok(Material {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        class_id: Uuid::parse_str(&class_str).unwrap_or_default(),
        teacher_id: Uuid::parse_str(&teacher_str).unwrap_or_default(),
        title: row.get(3)?,
        description: row.get(4)?,
        content: row.get(5)?,
        video_url: row.get(6)?,
        video_type: row.get(7)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Class errors.
#[derive(Debug, thiserror::Error)]
pub enum ClassError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Class not found: {0}")]
    NotFound(Uuid),

    #[error("Already enrolled in this class")]
    AlreadyEnrolled,

    #[error("Invalid class code: {0}")]
    InvalidCode(String),

    #[error("Could not generate a unique class code")]
    CodeGeneration,
}
