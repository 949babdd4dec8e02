//! Per-kind access to the variant tables, dispatched on `EntityKind`.

use diesel::dsl::not;
use diesel::prelude::*;

use crate::domain::entities::EntityVariant;
use crate::domain::value_objects::EntityKind;
use crate::infrastructure::database::models::{
    EducationModel, EntityModel, JobDescriptionModel, ProfessionalSummaryModel, ProjectModel,
    ResumeModel, SkillModel, WorkExperienceModel,
};
use crate::infrastructure::database::schema::{
    education, entities, generated_resumes, job_descriptions, professional_summaries, projects,
    skills, work_experiences,
};

pub fn insert(conn: &mut PgConnection, id: i32, variant: &EntityVariant) -> QueryResult<()> {
    match variant {
        EntityVariant::WorkExperience(v) => diesel::insert_into(work_experiences::table)
            .values(WorkExperienceModel::new(id, v))
            .execute(conn),
        EntityVariant::Education(v) => diesel::insert_into(education::table)
            .values(EducationModel::new(id, v))
            .execute(conn),
        EntityVariant::Skill(v) => diesel::insert_into(skills::table)
            .values(SkillModel::new(id, v))
            .execute(conn),
        EntityVariant::Project(v) => diesel::insert_into(projects::table)
            .values(ProjectModel::new(id, v))
            .execute(conn),
        EntityVariant::ProfessionalSummary(v) => diesel::insert_into(professional_summaries::table)
            .values(ProfessionalSummaryModel::new(id, v))
            .execute(conn),
        EntityVariant::Resume(v) => diesel::insert_into(generated_resumes::table)
            .values(ResumeModel::new(id, v))
            .execute(conn),
        EntityVariant::JobDescription(v) => diesel::insert_into(job_descriptions::table)
            .values(JobDescriptionModel::new(id, v))
            .execute(conn),
    }
    .map(|_| ())
}

/// Overwrites every column of the variant row. Returns the number of rows
/// touched, zero when the row is missing.
pub fn update(conn: &mut PgConnection, id: i32, variant: &EntityVariant) -> QueryResult<usize> {
    match variant {
        EntityVariant::WorkExperience(v) => diesel::update(work_experiences::table.find(id))
            .set(WorkExperienceModel::new(id, v))
            .execute(conn),
        EntityVariant::Education(v) => diesel::update(education::table.find(id))
            .set(EducationModel::new(id, v))
            .execute(conn),
        EntityVariant::Skill(v) => diesel::update(skills::table.find(id))
            .set(SkillModel::new(id, v))
            .execute(conn),
        EntityVariant::Project(v) => diesel::update(projects::table.find(id))
            .set(ProjectModel::new(id, v))
            .execute(conn),
        EntityVariant::ProfessionalSummary(v) => {
            diesel::update(professional_summaries::table.find(id))
                .set(ProfessionalSummaryModel::new(id, v))
                .execute(conn)
        }
        EntityVariant::Resume(v) => diesel::update(generated_resumes::table.find(id))
            .set(ResumeModel::new(id, v))
            .execute(conn),
        EntityVariant::JobDescription(v) => diesel::update(job_descriptions::table.find(id))
            .set(JobDescriptionModel::new(id, v))
            .execute(conn),
    }
}

pub fn load(conn: &mut PgConnection, kind: EntityKind, id: i32) -> QueryResult<Option<EntityVariant>> {
    let variant = match kind {
        EntityKind::WorkExperience => work_experiences::table
            .find(id)
            .select(WorkExperienceModel::as_select())
            .first(conn)
            .optional()?
            .map(|m| EntityVariant::WorkExperience(m.into())),
        EntityKind::Education => education::table
            .find(id)
            .select(EducationModel::as_select())
            .first(conn)
            .optional()?
            .map(|m| EntityVariant::Education(m.into())),
        EntityKind::Skill => skills::table
            .find(id)
            .select(SkillModel::as_select())
            .first(conn)
            .optional()?
            .map(|m| EntityVariant::Skill(m.into())),
        EntityKind::Project => projects::table
            .find(id)
            .select(ProjectModel::as_select())
            .first(conn)
            .optional()?
            .map(|m| EntityVariant::Project(m.into())),
        EntityKind::ProfessionalSummary => professional_summaries::table
            .find(id)
            .select(ProfessionalSummaryModel::as_select())
            .first(conn)
            .optional()?
            .map(|m| EntityVariant::ProfessionalSummary(m.into())),
        EntityKind::Resume => generated_resumes::table
            .find(id)
            .select(ResumeModel::as_select())
            .first(conn)
            .optional()?
            .map(|m| EntityVariant::Resume(m.into())),
        EntityKind::JobDescription => job_descriptions::table
            .find(id)
            .select(JobDescriptionModel::as_select())
            .first(conn)
            .optional()?
            .map(|m| EntityVariant::JobDescription(m.into())),
    };
    Ok(variant)
}

/// Entity rows of `kind` whose variant row is missing.
pub fn orphans(conn: &mut PgConnection, kind: EntityKind) -> QueryResult<Vec<EntityModel>> {
    let of_kind = entities::table.filter(entities::kind.eq(kind.as_str()));

    let rows = match kind {
        EntityKind::WorkExperience => of_kind
            .filter(not(entities::id.eq_any(work_experiences::table.select(work_experiences::id))))
            .select(EntityModel::as_select())
            .load(conn)?,
        EntityKind::Education => of_kind
            .filter(not(entities::id.eq_any(education::table.select(education::id))))
            .select(EntityModel::as_select())
            .load(conn)?,
        EntityKind::Skill => of_kind
            .filter(not(entities::id.eq_any(skills::table.select(skills::id))))
            .select(EntityModel::as_select())
            .load(conn)?,
        EntityKind::Project => of_kind
            .filter(not(entities::id.eq_any(projects::table.select(projects::id))))
            .select(EntityModel::as_select())
            .load(conn)?,
        EntityKind::ProfessionalSummary => of_kind
            .filter(not(entities::id.eq_any(
                professional_summaries::table.select(professional_summaries::id),
            )))
            .select(EntityModel::as_select())
            .load(conn)?,
        EntityKind::Resume => of_kind
            .filter(not(entities::id.eq_any(generated_resumes::table.select(generated_resumes::id))))
            .select(EntityModel::as_select())
            .load(conn)?,
        EntityKind::JobDescription => of_kind
            .filter(not(entities::id.eq_any(job_descriptions::table.select(job_descriptions::id))))
            .select(EntityModel::as_select())
            .load(conn)?,
    };
    Ok(rows)
}
