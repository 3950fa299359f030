use crate::directory::InMemoryDirectory;
use crate::engine::LaneEngine;

pub struct AppState {
    pub engine: LaneEngine<InMemoryDirectory>,
}
