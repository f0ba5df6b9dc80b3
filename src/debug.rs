use crate::config::RenderConfig;
use crate::road::Road;
use serde_json::json;

/// Describes the road and every vehicle on it as JSON, for an external renderer.
pub fn render_frame(road: &Road, render: &RenderConfig) -> serde_json::Value {
    let network = road.network();
    let lanes = network
        .iter_lanes()
        .map(|(index, lane)| {
            json!({
                "type": "lane",
                "name": network.describe(index),
                "start": [lane.start().x, lane.start().y],
                "end": [lane.end().x, lane.end().y],
                "width": lane.width(),
                "line_types": lane.line_types(),
                "speed_limit": lane.speed_limit(),
                "reserved": road.scenario().is_reserved(index),
            })
        })
        .collect::<Vec<_>>();

    let vehicles = road
        .iter()
        .map(|vehicle| {
            json!({
                "type": "vehicle",
                "position": [vehicle.position().x, vehicle.position().y],
                "heading": vehicle.heading(),
                "speed": vehicle.speed(),
                "crashed": vehicle.crashed(),
                "on_road": vehicle.on_road(),
                "controlled": vehicle.is_controlled(),
                "lane": network.describe(vehicle.lane_index()),
            })
        })
        .collect::<Vec<_>>();

    json!({
        "render": render,
        "lanes": lanes,
        "vehicles": vehicles,
    })
}
