use std::sync::Arc;

use crate::config::Config;
use crate::decode::BoardingPassPipeline;
use crate::flights::FlightStore;
use crate::storage::FsPassSink;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: BoardingPassPipeline,
    pub flights: Arc<dyn FlightStore>,
    /// Where uploaded passes are written and served from.
    pub passes: Arc<FsPassSink>,
}

impl AppState {
    pub fn new(
        config: Config,
        pipeline: BoardingPassPipeline,
        flights: Arc<dyn FlightStore>,
    ) -> Self {
        let passes = Arc::new(FsPassSink::new(
            &config.storage.pass_directory,
            &config.server.public_url,
        ));

        Self {
            config: Arc::new(config),
            pipeline,
            flights,
            passes,
        }
    }
}
