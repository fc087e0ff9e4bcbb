use crate::gui_bridge::model::VisualizationModel;
use log::{debug, error, info};
use std::{
    net::SocketAddr,
    sync::{Arc, PoisonError, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::Filter;

/// Bridge that hosts the visualization HTTP endpoint.
///
/// The station updates the model in place; the visualizer polls `GET /payload`.
pub struct GuiBridge {
    state: Arc<RwLock<VisualizationModel>>,
}

impl GuiBridge {
    pub fn new(addr: SocketAddr) -> Self {
        let state = Arc::new(RwLock::new(VisualizationModel::default()));
        let state_for_filter = state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());

        let get_route = warp::path("payload")
            .and(warp::get())
            .and(state_filter)
            .map(|state: Arc<RwLock<VisualizationModel>>| {
                let guard = state.read().unwrap_or_else(PoisonError::into_inner);
                warp::reply::json(&*guard)
            });

        let spawned = thread::Builder::new()
            .name("gui-bridge".into())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!("failed to build bridge runtime: {}", err);
                        return;
                    }
                };
                runtime.block_on(async move {
                    match warp::serve(get_route).try_bind_ephemeral(addr) {
                        Ok((bound, server)) => {
                            info!("visualization bridge listening on http://{}/payload", bound);
                            server.await;
                        }
                        Err(err) => error!("could not bind visualization bridge on {}: {}", addr, err),
                    }
                });
            });
        if let Err(err) = spawned {
            error!("could not start visualization bridge: {}", err);
        }

        Self { state }
    }

    /// Applies `change` to the served model.
    pub fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut VisualizationModel),
    {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut *guard);
        debug!(
            "[GUI] amplitudes {}, distance points {}, accepted {}",
            guard.amplitudes.len(),
            guard.distance.len(),
            guard.accepted
        );
    }

    pub fn publish_status(&self, message: &str) {
        println!("[GUI] {}", message);
        self.update(|model| model.status = message.to_string());
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> VisualizationModel {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csicore::prelude::PredictionSample;

    #[test]
    fn gui_bridge_updates_state() {
        let gui = GuiBridge::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        gui.update(|model| {
            model.amplitudes = vec![1.0, 2.0];
            model.position = Some(PredictionSample::new(0.5, 1.5));
        });
        gui.publish_status("collecting");

        let snapshot = gui.snapshot();
        assert_eq!(snapshot.amplitudes, vec![1.0, 2.0]);
        assert_eq!(snapshot.position, Some(PredictionSample::new(0.5, 1.5)));
        assert_eq!(snapshot.status, "collecting");
    }
}
