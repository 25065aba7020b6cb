use std::sync::Mutex;

use rusqlite::Connection;

use crate::roster::Roster;

/// Shared server state: the fixed roster and the rating store connection.
/// All store access serializes through the mutex; handlers only hold it
/// across synchronous store calls, never across an await point.
pub struct AppState {
    pub roster: Roster,
    pub db: Mutex<Connection>,
}

impl AppState {
    pub fn new(roster: Roster, conn: Connection) -> Self {
        Self {
            roster,
            db: Mutex::new(conn),
        }
    }
}
