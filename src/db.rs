use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Session, StudentInfo};
use crate::students::StudentRecord;
use crate::terms::AcademicPeriod;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

struct StudentRow<'a> {
    student_id: &'a str,
    first_name: &'a str,
    paternal_surname: &'a str,
    maternal_surname: &'a str,
    program: &'a str,
    term: &'a str,
    /// `None` keeps the stored count on update.
    absences: Option<i32>,
    low_grade_incidents: Option<i32>,
}

async fn upsert_student(pool: &PgPool, student: &StudentRow<'_>) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO tutoring.students
        (id, student_id, first_name, paternal_surname, maternal_surname, program, term,
         absences, low_grade_incidents)
        VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, 0), COALESCE($9, 0))
        ON CONFLICT (student_id) DO UPDATE
        SET first_name = EXCLUDED.first_name,
            paternal_surname = EXCLUDED.paternal_surname,
            maternal_surname = EXCLUDED.maternal_surname,
            program = EXCLUDED.program,
            term = EXCLUDED.term,
            absences = COALESCE($8, tutoring.students.absences),
            low_grade_incidents = COALESCE($9, tutoring.students.low_grade_incidents)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student.student_id)
    .bind(student.first_name)
    .bind(student.paternal_surname)
    .bind(student.maternal_surname)
    .bind(student.program)
    .bind(student.term)
    .bind(student.absences)
    .bind(student.low_grade_incidents)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

/// Inserts one session; returns false when its source key already exists.
async fn insert_session(
    pool: &PgPool,
    student_ref: Uuid,
    session: &Session,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO tutoring.sessions
        (id, student_ref, term, reason, session_date, description, follow_up, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_ref)
    .bind(session.term.as_deref())
    .bind(&session.reason)
    .bind(session.date)
    .bind(&session.description)
    .bind(&session.follow_up)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn seed_session(reason: &str, term: &str, date: NaiveDate, description: &str) -> Session {
    Session {
        reason: reason.to_string(),
        term: Some(term.to_string()),
        date: Some(date),
        description: description.to_string(),
        follow_up: "Follow-up scheduled".to_string(),
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).context("invalid date");

    let students = vec![
        (
            ("1234567890", "Juan", "Pérez", "García", "Software Engineering", "7", 3, 3),
            vec![
                ("seed-001", seed_session("Baja calificación en Matemáticas", "7", date(2025, 10, 1)?, "Not studying")),
                ("seed-002", seed_session("Inasistencias recurrentes", "7", date(2025, 10, 15)?, "Missed three classes")),
                ("seed-003", seed_session("Baja calificación en Física", "6", date(2025, 5, 1)?, "Missing homework")),
                ("seed-004", seed_session("Reforzamiento de Álgebra", "6", date(2025, 6, 1)?, "Basic questions")),
                ("seed-005", seed_session("Baja calificación en Programación", "5", date(2024, 12, 1)?, "Struggles with OOP")),
            ],
        ),
        (
            ("9876543210", "Ana", "López", "Sánchez", "Software Engineering", "7", 0, 0),
            vec![
                ("seed-006", seed_session("Asesoría general sobre horarios", "7", date(2025, 11, 1)?, "Schedule questions")),
            ],
        ),
        (
            ("2025006", "Laura", "Flores", "Morales", "Software Engineering", "7", 1, 0),
            vec![
                ("seed-007", seed_session("Problemas de conducta", "6", date(2025, 6, 12)?, "Classroom conflict")),
                ("seed-008", seed_session("Falta de motivación", "7", date(2025, 9, 20)?, "Considering dropping out")),
                ("seed-009", seed_session("Inasistencias frecuentes", "7", date(2025, 10, 3)?, "Two weeks absent")),
            ],
        ),
        (
            ("2025003", "Carlos", "Rodríguez", "Hernández", "Financial Engineering", "4", 0, 1),
            vec![
                ("seed-010", seed_session("Bajo desempeño académico", "4", date(2025, 10, 8)?, "Failing accounting")),
                ("seed-011", seed_session("Necesita apoyo en proyecto final", "4", date(2025, 10, 22)?, "Project scoping")),
            ],
        ),
    ];

    for ((student_id, first, paternal, maternal, program, term, absences, low_grades), sessions) in
        students
    {
        let student_ref = upsert_student(
            pool,
            &StudentRow {
                student_id,
                first_name: first,
                paternal_surname: paternal,
                maternal_surname: maternal,
                program,
                term,
                absences: Some(absences),
                low_grade_incidents: Some(low_grades),
            },
        )
        .await?;

        for (source_key, session) in sessions {
            insert_session(pool, student_ref, &session, source_key).await?;
        }
    }

    info!("seeded fixture students");
    Ok(())
}

pub async fn fetch_students(
    pool: &PgPool,
    program: Option<&str>,
    student_id: Option<&str>,
) -> anyhow::Result<Vec<StudentRecord>> {
    let mut query = String::from(
        "SELECT id, student_id, first_name, paternal_surname, maternal_surname, program, term, \
         absences, low_grade_incidents \
         FROM tutoring.students WHERE TRUE",
    );

    let mut position = 1;
    if program.is_some() {
        query.push_str(&format!(" AND program = ${position}"));
        position += 1;
    }
    if student_id.is_some() {
        query.push_str(&format!(" AND student_id = ${position}"));
    }
    query.push_str(" ORDER BY paternal_surname, first_name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = program {
        rows = rows.bind(value);
    }
    if let Some(value) = student_id {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut students = Vec::new();

    for row in records {
        let maternal: String = row.get("maternal_surname");
        let absences: i32 = row.get("absences");
        let low_grade_incidents: i32 = row.get("low_grade_incidents");

        students.push(StudentRecord {
            id: row.get("id"),
            info: StudentInfo {
                student_id: Some(row.get("student_id")),
                first_name: Some(row.get("first_name")),
                paternal_surname: Some(row.get("paternal_surname")),
                maternal_surname: Some(maternal).filter(|v| !v.is_empty()),
                program: Some(row.get("program")),
                term: Some(row.get("term")),
            },
            absences: absences.max(0) as usize,
            low_grade_incidents: low_grade_incidents.max(0) as usize,
        });
    }

    Ok(students)
}

pub async fn fetch_sessions(
    pool: &PgPool,
    student_refs: &[Uuid],
) -> anyhow::Result<Vec<(Uuid, Session)>> {
    let records = sqlx::query(
        "SELECT student_ref, term, reason, session_date, description, follow_up \
         FROM tutoring.sessions \
         WHERE student_ref = ANY($1) \
         ORDER BY session_date NULLS LAST, created_at",
    )
    .bind(student_refs)
    .fetch_all(pool)
    .await?;

    let mut sessions = Vec::new();
    for row in records {
        sessions.push((
            row.get("student_ref"),
            Session {
                reason: row.get("reason"),
                term: row.get("term"),
                date: row.get("session_date"),
                description: row.get("description"),
                follow_up: row.get("follow_up"),
            },
        ));
    }

    Ok(sessions)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_id: String,
        first_name: String,
        paternal_surname: String,
        #[serde(default)]
        maternal_surname: Option<String>,
        program: String,
        student_term: String,
        #[serde(default)]
        absences: Option<i32>,
        #[serde(default)]
        low_grade_incidents: Option<i32>,
        #[serde(default)]
        session_term: Option<String>,
        reason: String,
        #[serde(default)]
        date: Option<NaiveDate>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        follow_up: Option<String>,
        #[serde(default)]
        source_key: Option<String>,
    }

    let period = AcademicPeriod::current();
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        if !period.offers(&row.student_term) {
            warn!(
                student_id = %row.student_id,
                term = %row.student_term,
                period = period.name(),
                "term is not offered in the current period"
            );
        }

        let student_ref = upsert_student(
            pool,
            &StudentRow {
                student_id: &row.student_id,
                first_name: &row.first_name,
                paternal_surname: &row.paternal_surname,
                maternal_surname: row.maternal_surname.as_deref().unwrap_or(""),
                program: &row.program,
                term: &row.student_term,
                absences: row.absences,
                low_grade_incidents: row.low_grade_incidents,
            },
        )
        .await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let session = Session {
            reason: row.reason,
            term: row.session_term.filter(|t| !t.is_empty()),
            date: row.date,
            description: row.description.unwrap_or_default(),
            follow_up: row.follow_up.unwrap_or_default(),
        };

        if insert_session(pool, student_ref, &session, &source_key).await? {
            inserted += 1;
        }
    }

    info!(inserted, path = %csv_path.display(), "imported sessions");
    Ok(inserted)
}
