//! Pokedex demo.
//!
//! Plays a view that looks up pokemon by name against a slow, simulated
//! GraphQL endpoint. Shows the cache, a failed lookup and retry, and a fast
//! switch between names where the slower answer is dropped.
//!
//! ```text
//! RUST_LOG=lattice_query=debug cargo run -p lattice-query --example pokemon
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use lattice_query::fetch::{decode_envelope, FetchError};
use lattice_query::query::{AsyncRequestCoordinator, CoordinatorConfig, RequestKey, RequestState};

#[derive(Debug, Clone, Deserialize)]
struct Pokemon {
    name: String,
    number: String,
    #[serde(default)]
    attacks: Vec<String>,
}

/// Simulated endpoint: answers after `latency`, with a GraphQL-style body.
async fn fetch_pokemon(key: RequestKey, latency: Duration) -> Result<Pokemon, FetchError> {
    tokio::time::sleep(latency).await;

    let body = match key.as_str() {
        "pikachu" => r#"{ "data": { "pokemon": { "name": "pikachu", "number": "025", "attacks": ["Thunder Shock"] } } }"#,
        "bulbasaur" => r#"{ "data": { "pokemon": { "name": "bulbasaur", "number": "001", "attacks": ["Vine Whip"] } } }"#,
        "mew" => r#"{ "data": { "pokemon": { "name": "mew", "number": "151" } } }"#,
        "offline" => return Err(FetchError::transport("connection refused")),
        _ => r#"{ "data": { "pokemon": null } }"#,
    };

    decode_envelope("pokemon", &key, body.as_bytes())
}

fn render(state: &RequestState<Pokemon, FetchError>) -> String {
    match state {
        RequestState::Idle => "submit a pokemon".to_string(),
        RequestState::Loading => "loading...".to_string(),
        RequestState::Loaded { data } => {
            format!("#{} {} {:?}", data.number, data.name, data.attacks)
        }
        RequestState::Errored { error } => format!("error: {error}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lattice_query=debug")),
        )
        .init();

    let config = CoordinatorConfig::from_json(r#"{ "name": "pokedex", "cache_capacity": 8 }"#)?;
    let pokedex: AsyncRequestCoordinator<Pokemon, FetchError> = AsyncRequestCoordinator::new(config)?;

    let view = pokedex.downgrade();
    let subscription = pokedex.subscribe(move || {
        let Some(view) = view.upgrade() else { return };
        let key = view.current_key().map(|k| k.to_string()).unwrap_or_default();
        println!("[{key:>10}] {}", render(&view.state()));
    });

    let fetch = |key: RequestKey| fetch_pokemon(key, Duration::from_millis(150));
    let slow_fetch = |key: RequestKey| fetch_pokemon(key, Duration::from_millis(600));
    let mut updates = pokedex.watch();

    for name in ["pikachu", "missingno", "bulbasaur", "pikachu"] {
        pokedex.request(name, &fetch);
        updates.wait_for(|state| state.is_settled()).await?;
    }

    // Switch away before the slow answer arrives: it is dropped.
    pokedex.request("mew", &slow_fetch);
    pokedex.request("offline", &fetch);
    updates.wait_for(|state| state.is_settled()).await?;
    tokio::time::sleep(Duration::from_millis(700)).await;

    println!("previously viewed: {:?}", pokedex.cached_keys());

    pokedex.unsubscribe(subscription);
    pokedex.dispose();
    Ok(())
}
