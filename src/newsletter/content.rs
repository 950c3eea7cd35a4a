use askama::Template;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::{Career, Certificate, ContentKind, Project, Skill};

/// What a dispatch sends: one subject and HTML body for one content kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterPayload {
    pub subject: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

#[derive(Template)]
#[template(path = "newsletter/project.html")]
struct ProjectTemplate<'a> {
    project: &'a Project,
    project_url: String,
}

#[derive(Template)]
#[template(path = "newsletter/certificate.html")]
struct CertificateTemplate<'a> {
    certificate: &'a Certificate,
    issued: Option<String>,
    certificates_url: String,
}

#[derive(Template)]
#[template(path = "newsletter/skill.html")]
struct SkillTemplate<'a> {
    skill: &'a Skill,
    skills_url: String,
}

#[derive(Template)]
#[template(path = "newsletter/career.html")]
struct CareerTemplate<'a> {
    career: &'a Career,
    period: String,
    career_url: String,
}

/// Load the record `id` of `kind` and render its newsletter.
pub async fn generate(
    pool: &PgPool,
    app_url: &str,
    kind: ContentKind,
    id: Uuid,
) -> Result<NewsletterPayload, AppError> {
    match kind {
        ContentKind::Project => {
            let project = db::projects::find_by_id(pool, id)
                .await?
                .ok_or_else(|| not_found(kind))?;
            project_newsletter(&project, app_url)
        }
        ContentKind::Certificate => {
            let certificate = db::certificates::find_by_id(pool, id)
                .await?
                .ok_or_else(|| not_found(kind))?;
            certificate_newsletter(&certificate, app_url)
        }
        ContentKind::Skill => {
            let skill = db::skills::find_by_id(pool, id)
                .await?
                .ok_or_else(|| not_found(kind))?;
            skill_newsletter(&skill, app_url)
        }
        ContentKind::Career => {
            let career = db::careers::find_by_id(pool, id)
                .await?
                .ok_or_else(|| not_found(kind))?;
            career_newsletter(&career, app_url)
        }
    }
}

pub fn project_newsletter(project: &Project, app_url: &str) -> Result<NewsletterPayload, AppError> {
    let content = ProjectTemplate {
        project,
        project_url: format!("{app_url}/projects/{}", project.id),
    }
    .render()?;

    Ok(NewsletterPayload {
        subject: format!("New project: {}", project.title),
        content,
        kind: ContentKind::Project,
        project_id: Some(project.id),
    })
}

pub fn certificate_newsletter(
    certificate: &Certificate,
    app_url: &str,
) -> Result<NewsletterPayload, AppError> {
    let content = CertificateTemplate {
        certificate,
        issued: certificate.issue_date.map(|d| d.format("%B %-d, %Y").to_string()),
        certificates_url: format!("{app_url}/certificates"),
    }
    .render()?;

    Ok(NewsletterPayload {
        subject: format!("New certificate: {}", certificate.title),
        content,
        kind: ContentKind::Certificate,
        project_id: None,
    })
}

pub fn skill_newsletter(skill: &Skill, app_url: &str) -> Result<NewsletterPayload, AppError> {
    let content = SkillTemplate {
        skill,
        skills_url: format!("{app_url}/skills"),
    }
    .render()?;

    Ok(NewsletterPayload {
        subject: format!("New skill: {}", skill.name),
        content,
        kind: ContentKind::Skill,
        project_id: None,
    })
}

pub fn career_newsletter(career: &Career, app_url: &str) -> Result<NewsletterPayload, AppError> {
    let start = career.start_date.format("%b %Y");
    let period = match (career.is_current, career.end_date) {
        (true, _) | (false, None) => format!("{start} - Present"),
        (false, Some(end)) => format!("{start} - {}", end.format("%b %Y")),
    };

    let content = CareerTemplate {
        career,
        period,
        career_url: format!("{app_url}/about#career"),
    }
    .render()?;

    Ok(NewsletterPayload {
        subject: format!("Career update: {} at {}", career.title, career.company),
        content,
        kind: ContentKind::Career,
        project_id: None,
    })
}

fn not_found(kind: ContentKind) -> AppError {
    AppError::NotFound(format!("{} not found", kind.label()))
}
