//! Plan a meeting for three walkers in central Berlin with offline collaborators.
//!
//! Usage:
//!   cargo run -p rendezvous --example offline_meeting -- [min_sum|min_max] [minutes]
//!
//! Prints the wire JSON (without the debug payload).

use rendezvous::prelude::*;

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let objective = args.next().unwrap_or_else(|| "min_max".to_string());
    let minutes = args.next().and_then(|m| m.parse().ok()).unwrap_or(15);

    let request = MeetingRequest {
        participants: vec![
            participant("Alexanderplatz", 52.5219, 13.4132),
            participant("Hackescher Markt", 52.5225, 13.4024),
            participant("Jannowitzbrücke", 52.5150, 13.4180),
        ],
        profile: "walking".into(),
        max_minutes: Some(minutes),
        objective,
        grid_resolution_m: Some(100.0),
    };
    let planner = Planner::new(
        DiscIsochrones::default(),
        StraightLineOracle::default(),
        PlanCfg::default(),
    );
    match planner.plan(&request).await {
        Ok(outcome) => {
            let resp = PlanResponse::from_outcome(&outcome, false);
            match serde_json::to_string_pretty(&resp) {
                Ok(s) => println!("{s}"),
                Err(e) => eprintln!("serialization failed: {e}"),
            }
        }
        Err(e) => eprintln!("planning failed: {e}"),
    }
}

fn participant(address: &str, lat: f64, lng: f64) -> ParticipantInput {
    ParticipantInput {
        address: address.to_string(),
        lat,
        lng,
    }
}
