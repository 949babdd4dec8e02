//! One row model per variant table. `id` is both the primary key and the
//! foreign key to `entities.id`.

use chrono::NaiveDate;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::entities::variants::{
    Education, JobDescription, ProfessionalSummary, Project, Resume, Skill, WorkExperience,
};
use crate::infrastructure::database::schema::{
    education, generated_resumes, job_descriptions, professional_summaries, projects, skills,
    work_experiences,
};

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = work_experiences)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WorkExperienceModel {
    pub id: i32,
    pub profile_id: i32,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl WorkExperienceModel {
    pub fn new(id: i32, v: &WorkExperience) -> Self {
        Self {
            id,
            profile_id: v.profile_id,
            job_title: v.job_title.clone(),
            company: v.company.clone(),
            start_date: v.start_date,
            end_date: v.end_date,
            description: v.description.clone(),
        }
    }
}

impl From<WorkExperienceModel> for WorkExperience {
    fn from(m: WorkExperienceModel) -> Self {
        Self {
            profile_id: m.profile_id,
            job_title: m.job_title,
            company: m.company,
            start_date: m.start_date,
            end_date: m.end_date,
            description: m.description,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = education)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EducationModel {
    pub id: i32,
    pub profile_id: i32,
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub honors: Option<String>,
    pub gpa: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl EducationModel {
    pub fn new(id: i32, v: &Education) -> Self {
        Self {
            id,
            profile_id: v.profile_id,
            institution: v.institution.clone(),
            degree: v.degree.clone(),
            field_of_study: v.field_of_study.clone(),
            honors: v.honors.clone(),
            gpa: v.gpa,
            start_date: v.start_date,
            end_date: v.end_date,
            description: v.description.clone(),
        }
    }
}

impl From<EducationModel> for Education {
    fn from(m: EducationModel) -> Self {
        Self {
            profile_id: m.profile_id,
            institution: m.institution,
            degree: m.degree,
            field_of_study: m.field_of_study,
            honors: m.honors,
            gpa: m.gpa,
            start_date: m.start_date,
            end_date: m.end_date,
            description: m.description,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = skills)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SkillModel {
    pub id: i32,
    pub profile_id: i32,
    pub category: Option<String>,
    pub name: Option<String>,
    pub proficiency: Option<String>,
}

impl SkillModel {
    pub fn new(id: i32, v: &Skill) -> Self {
        Self {
            id,
            profile_id: v.profile_id,
            category: v.category.clone(),
            name: v.name.clone(),
            proficiency: v.proficiency.clone(),
        }
    }
}

impl From<SkillModel> for Skill {
    fn from(m: SkillModel) -> Self {
        Self {
            profile_id: m.profile_id,
            category: m.category,
            name: m.name,
            proficiency: m.proficiency,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = projects)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProjectModel {
    pub id: i32,
    pub profile_id: i32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub project_url: Option<String>,
}

impl ProjectModel {
    pub fn new(id: i32, v: &Project) -> Self {
        Self {
            id,
            profile_id: v.profile_id,
            title: v.title.clone(),
            description: v.description.clone(),
            start_date: v.start_date,
            end_date: v.end_date,
            project_url: v.project_url.clone(),
        }
    }
}

impl From<ProjectModel> for Project {
    fn from(m: ProjectModel) -> Self {
        Self {
            profile_id: m.profile_id,
            title: m.title,
            description: m.description,
            start_date: m.start_date,
            end_date: m.end_date,
            project_url: m.project_url,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = professional_summaries)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfessionalSummaryModel {
    pub id: i32,
    pub profile_id: i32,
    pub summary_text: Option<String>,
}

impl ProfessionalSummaryModel {
    pub fn new(id: i32, v: &ProfessionalSummary) -> Self {
        Self {
            id,
            profile_id: v.profile_id,
            summary_text: v.summary_text.clone(),
        }
    }
}

impl From<ProfessionalSummaryModel> for ProfessionalSummary {
    fn from(m: ProfessionalSummaryModel) -> Self {
        Self {
            profile_id: m.profile_id,
            summary_text: m.summary_text,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = generated_resumes)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ResumeModel {
    pub id: i32,
    pub profile_id: i32,
    pub job_description_uuid: Option<Uuid>,
    pub title: Option<String>,
    pub template_name: Option<String>,
    pub content: Option<String>,
    pub relevance_score: Option<f64>,
}

impl ResumeModel {
    pub fn new(id: i32, v: &Resume) -> Self {
        Self {
            id,
            profile_id: v.profile_id,
            job_description_uuid: v.job_description_uuid,
            title: v.title.clone(),
            template_name: v.template_name.clone(),
            content: v.content.clone(),
            relevance_score: v.relevance_score,
        }
    }
}

impl From<ResumeModel> for Resume {
    fn from(m: ResumeModel) -> Self {
        Self {
            profile_id: m.profile_id,
            job_description_uuid: m.job_description_uuid,
            title: m.title,
            template_name: m.template_name,
            content: m.content,
            relevance_score: m.relevance_score,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = job_descriptions)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobDescriptionModel {
    pub id: i32,
    pub user_id: i32,
    pub url: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub description: Option<String>,
}

impl JobDescriptionModel {
    pub fn new(id: i32, v: &JobDescription) -> Self {
        Self {
            id,
            user_id: v.user_id,
            url: v.url.clone(),
            title: v.title.clone(),
            company: v.company.clone(),
            description: v.description.clone(),
        }
    }
}

impl From<JobDescriptionModel> for JobDescription {
    fn from(m: JobDescriptionModel) -> Self {
        Self {
            user_id: m.user_id,
            url: m.url,
            title: m.title,
            company: m.company,
            description: m.description,
        }
    }
}
