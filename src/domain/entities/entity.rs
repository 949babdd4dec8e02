use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::variants::EntityVariant;
use crate::domain::value_objects::EntityKind;

/// Result of the identity allocator: the row key used for joins and the
/// global identifier shared with other systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityIdentity {
    local_key: i32,
    uuid: Uuid,
}

impl EntityIdentity {
    pub fn new(local_key: i32, uuid: Uuid) -> Self {
        Self { local_key, uuid }
    }

    pub fn local_key(&self) -> i32 {
        self.local_key
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

/// Fields every variant inherits from the `entities` base row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRecord {
    #[serde(skip)]
    local_key: i32,
    uuid: Uuid,
    kind: EntityKind,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn from_database(
        local_key: i32,
        uuid: Uuid,
        kind: EntityKind,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            local_key,
            uuid,
            kind,
            created_at,
            updated_at,
        }
    }

    pub fn identity(&self) -> EntityIdentity {
        EntityIdentity::new(self.local_key, self.uuid)
    }

    /// Join key. Stays inside the persistence layer.
    pub fn local_key(&self) -> i32 {
        self.local_key
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn updated_since(&self, since: DateTime<Utc>) -> bool {
        self.updated_at >= since
    }
}

/// A concrete record with its base fields joined in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainEntity {
    #[serde(flatten)]
    pub record: EntityRecord,
    pub variant: EntityVariant,
}

impl DomainEntity {
    pub fn new(record: EntityRecord, variant: EntityVariant) -> Result<Self, String> {
        if record.kind() != variant.kind() {
            return Err(format!(
                "Entity {} is a {} but its variant row is a {}",
                record.uuid(),
                record.kind(),
                variant.kind()
            ));
        }
        Ok(Self { record, variant })
    }

    pub fn uuid(&self) -> Uuid {
        self.record.uuid()
    }

    pub fn kind(&self) -> EntityKind {
        self.record.kind()
    }
}
