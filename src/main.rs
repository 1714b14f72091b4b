use callkeeper::application::{CallController, InputDisposition};
use callkeeper::config::Config;
use callkeeper::domain::call::cleanup::CleanupChain;
use callkeeper::domain::call::port::EventSink;
use callkeeper::infrastructure::audit::{FanoutEventSink, MemoryEventSink, TracingEventSink};
use callkeeper::infrastructure::logging::init_logging;
use callkeeper::infrastructure::metrics::init_metrics;
use callkeeper::infrastructure::transport::{DisconnectBehavior, LoopbackTransport, ScriptedSpeech};
use std::sync::Arc;
use tracing::{info, warn};

/// One scripted conversation for the demo
struct Scenario {
    name: &'static str,
    utterances: &'static [&'static str],
    disconnect: DisconnectBehavior,
    force_disconnect: DisconnectBehavior,
}

static SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "clean goodbye",
        utterances: &["Hi, I'd like to book a fitting", "That's all, thanks, goodbye!"],
        disconnect: DisconnectBehavior::Clean,
        force_disconnect: DisconnectBehavior::Clean,
    },
    Scenario {
        name: "flaky room",
        utterances: &["Do you have any drivers in stock?", "ok bye"],
        disconnect: DisconnectBehavior::Fail,
        force_disconnect: DisconnectBehavior::Clean,
    },
    Scenario {
        name: "hanging room",
        utterances: &["alright, bye for now"],
        disconnect: DisconnectBehavior::Hang,
        force_disconnect: DisconnectBehavior::Clean,
    },
    Scenario {
        name: "broken room",
        utterances: &["please end call"],
        disconnect: DisconnectBehavior::Fault,
        force_disconnect: DisconnectBehavior::Fault,
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize tracing
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!(e))?;
    let metrics = init_metrics()?;

    info!("Starting Callkeeper demo");
    info!("Configuration loaded: {:?}", config);

    let phrases = config.termination.phrase_set()?;
    let settings = config.termination.controller_settings();
    let chain = Arc::new(CleanupChain::standard());
    let memory = Arc::new(MemoryEventSink::new(4096));
    let sink: Arc<dyn EventSink> = Arc::new(FanoutEventSink::new(vec![
        Arc::new(TracingEventSink::new()),
        memory.clone(),
    ]));

    let mut handles = Vec::new();
    for (index, scenario) in SCENARIOS.iter().enumerate() {
        let transport = LoopbackTransport::new(format!("demo-room-{}", index))
            .with_disconnect(scenario.disconnect)
            .with_force_disconnect(scenario.force_disconnect);

        let mut controller = CallController::new(
            Arc::new(transport),
            Arc::new(ScriptedSpeech::new()),
            sink.clone(),
        )
        .with_phrases(phrases.clone())
        .with_cleanup_chain(chain.clone())
        .with_settings(settings.clone());

        handles.push(tokio::spawn(async move {
            run_scenario(scenario, &mut controller).await
        }));
    }

    for handle in handles {
        handle.await??;
    }

    info!("Recorded {} call events", memory.len().await);
    println!("{}", metrics.render());

    Ok(())
}

async fn run_scenario(scenario: &Scenario, controller: &mut CallController) -> anyhow::Result<()> {
    info!("=== Scenario: {} ===", scenario.name);
    controller.accept().await?;

    for utterance in scenario.utterances {
        match controller.on_user_input(utterance).await {
            InputDisposition::Terminated(report) => {
                info!(
                    "{}: call {} ended in {} ({}) after tiers {:?}",
                    scenario.name,
                    report.call_id,
                    report.state,
                    report.disposition.as_str(),
                    report.tiers
                );
                return Ok(());
            }
            InputDisposition::Forwarded | InputDisposition::Ignored => {}
        }
    }

    warn!("{}: no termination phrase heard, hanging up", scenario.name);
    let report = controller.terminate().await;
    info!("{}: call ended in {}", scenario.name, report.state);
    Ok(())
}
