use crate::gui_bridge::model::DashboardModel;
use breathcore::pipeline::{LatestReport, PipelineController};
use breathcore::PipelineConfig;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::task::JoinHandle;
use warp::{http::StatusCode, Filter};

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

/// HTTP front end over a live pipeline: latest report, alert history,
/// counters and configuration updates.
#[derive(Clone)]
pub struct GuiBridge {
    controller: Arc<PipelineController>,
    latest: Arc<LatestReport>,
}

impl GuiBridge {
    pub fn new(controller: Arc<PipelineController>, latest: Arc<LatestReport>) -> Self {
        Self { controller, latest }
    }

    pub fn snapshot(&self) -> DashboardModel {
        DashboardModel::from_report(self.latest.get().as_ref(), self.controller.state())
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let bridge = self.clone();
        let bridge_filter = warp::any().map(move || bridge.clone());

        let report_route = warp::path("report")
            .and(warp::path::end())
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: GuiBridge| warp::reply::json(&bridge.snapshot()));

        let full_report_route = warp::path!("report" / "full")
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: GuiBridge| match bridge.latest.get() {
                Some(report) => {
                    warp::reply::with_status(warp::reply::json(&report), StatusCode::OK)
                }
                None => warp::reply::with_status(
                    warp::reply::json(&json!({"status": "waiting"})),
                    StatusCode::NOT_FOUND,
                ),
            });

        let alerts_route = warp::path("alerts")
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: GuiBridge| warp::reply::json(&bridge.controller.alert_history()));

        let metrics_route = warp::path("metrics")
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: GuiBridge| warp::reply::json(&bridge.controller.metrics()));

        let config_get_route = warp::path("config")
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: GuiBridge| warp::reply::json(&bridge.controller.config()));

        let config_post_route = warp::path("config")
            .and(warp::post())
            .and(warp::body::json())
            .and(bridge_filter)
            .map(|config: PipelineConfig, bridge: GuiBridge| {
                match bridge.controller.update_config(config) {
                    Ok(()) => warp::reply::with_status(
                        warp::reply::json(&json!({"status": "ok"})),
                        StatusCode::OK,
                    ),
                    Err(err) => {
                        log::warn!("[bridge] rejected config: {}", err);
                        warp::reply::with_status(
                            warp::reply::json(
                                &json!({"status": "rejected", "error": err.to_string()}),
                            ),
                            StatusCode::BAD_REQUEST,
                        )
                    }
                }
            });

        report_route
            .or(full_report_route)
            .or(alerts_route)
            .or(metrics_route)
            .or(config_get_route)
            .or(config_post_route)
    }

    /// Serves the routes on the current runtime until the task is aborted.
    pub fn serve(&self, address: SocketAddr) -> JoinHandle<()> {
        let routes = self.routes();
        log::info!("[bridge] listening on http://{}", address);
        tokio::spawn(warp::serve(routes).run(address))
    }
}
