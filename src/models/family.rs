use chrono::NaiveDateTime;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::schema::families;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = families)]
pub struct Family {
    pub id: i32,
    pub name: String,
    pub created_timestamp: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = families)]
pub struct NewFamily<'a> {
    pub name: &'a str,
    pub created_timestamp: NaiveDateTime,
}
