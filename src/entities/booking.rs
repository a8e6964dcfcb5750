use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::geo::Coordinate;

/// An accepted ride request. Never mutated after insert; whether it is
/// still active is derived from `expires_at`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub rider_id: Uuid,
    pub carpool_id: i64,
    pub pickup_lat: f64,
    pub pickup_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
    pub created_at: DateTimeUtc,
    pub expires_at: DateTimeUtc,
    pub cost: f64,
}

impl Model {
    pub fn is_active(&self, now: DateTimeUtc) -> bool {
        now < self.expires_at
    }

    pub fn pickup(&self) -> Coordinate {
        Coordinate::new_unchecked(self.pickup_lat, self.pickup_lon)
    }

    pub fn destination(&self) -> Coordinate {
        Coordinate::new_unchecked(self.dest_lat, self.dest_lon)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::carpool::Entity",
        from = "Column::CarpoolId",
        to = "super::carpool::Column::Id"
    )]
    Carpool,
    #[sea_orm(
        belongs_to = "super::rider::Entity",
        from = "Column::RiderId",
        to = "super::rider::Column::Id"
    )]
    Rider,
}

impl Related<super::carpool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Carpool.def()
    }
}

impl Related<super::rider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
