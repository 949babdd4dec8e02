use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::entities::EntityRecord;
use crate::domain::value_objects::EntityKind;
use crate::infrastructure::database::schema::entities;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = entities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EntityModel {
    pub id: i32,
    pub uuid: Uuid,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity allocation: `id` comes from the sequence, `uuid` is generated here.
#[derive(Debug, Insertable)]
#[diesel(table_name = entities)]
pub struct NewEntityModel {
    pub uuid: Uuid,
    pub kind: String,
}

impl NewEntityModel {
    pub fn allocate(kind: EntityKind) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind: kind.as_str().to_string(),
        }
    }
}

impl TryFrom<EntityModel> for EntityRecord {
    type Error = String;

    fn try_from(model: EntityModel) -> Result<Self, Self::Error> {
        let kind = EntityKind::from_string(&model.kind)?;
        Ok(EntityRecord::from_database(
            model.id,
            model.uuid,
            kind,
            model.created_at,
            model.updated_at,
        ))
    }
}
