//! Generation run tests against the in-memory repository and a scripted
//! generator.

mod common;

use common::{collect_events, count_kind, Fixture};
use course_service::services::generation::{GenerationError, ProgressEvent, RunSummary};
use course_service::services::providers::mock::MockContentGenerator;
use std::sync::Arc;
use tokio::sync::mpsc;

async fn run(
    fixture: &Fixture,
    generator: Arc<MockContentGenerator>,
) -> (Result<RunSummary, GenerationError>, Vec<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(256);
    let result = fixture
        .orchestrator(generator)
        .run(fixture.topic_id, tx)
        .await;
    (result, collect_events(rx).await)
}

#[tokio::test]
async fn new_block_gets_contribution_and_footer() {
    let fixture = Fixture::new().with_types(&["definicion"]).with_keys(&["Gemini"]);
    let generator = Arc::new(MockContentGenerator::new().respond("Gemini", "X"));

    let (result, events) = run(&fixture, generator).await;

    assert_eq!(
        result.unwrap(),
        RunSummary {
            succeeded: 1,
            failed: 0
        }
    );
    let blocks = fixture.repo.blocks(fixture.topic_id);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].content_type, "definicion");
    assert_eq!(blocks[0].body, "X\n\n(Fuentes de IA: Gemini)");
    assert_eq!(blocks[0].ai_sources.as_deref(), Some("Gemini"));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Finished {
            succeeded: 1,
            failed: 0
        })
    );
}

#[tokio::test]
async fn existing_block_is_amended_with_sorted_sources() {
    let fixture = Fixture::new().with_types(&["definicion"]).with_keys(&["Gemini"]);
    fixture
        .repo
        .add_block(fixture.topic_id, "definicion", "Old", Some("OpenAI"));
    let generator = Arc::new(MockContentGenerator::new().respond("Gemini", "New"));

    let (result, _) = run(&fixture, generator).await;

    assert_eq!(result.unwrap().succeeded, 1);
    let blocks = fixture.repo.blocks(fixture.topic_id);
    assert_eq!(blocks.len(), 1);
    assert_eq!(
        blocks[0].body,
        "Old\n\n---\n\nNew\n\n(Fuentes de IA: Gemini, OpenAI)"
    );
    assert_eq!(blocks[0].ai_sources.as_deref(), Some("Gemini, OpenAI"));
}

#[tokio::test]
async fn two_models_on_one_type_share_a_block() {
    let fixture = Fixture::new()
        .with_types(&["tip"])
        .with_keys(&["Gemini", "OpenAI"]);
    let generator = Arc::new(
        MockContentGenerator::new()
            .respond("Gemini", "Primero")
            .respond("OpenAI", "Segundo"),
    );

    let (result, _) = run(&fixture, generator).await;

    assert_eq!(result.unwrap().succeeded, 2);
    let blocks = fixture.repo.blocks(fixture.topic_id);
    assert_eq!(blocks.len(), 1);
    assert_eq!(
        blocks[0].body,
        "Primero\n\n---\n\nSegundo\n\n(Fuentes de IA: Gemini, OpenAI)"
    );
}

#[tokio::test]
async fn zero_eligible_types_is_a_configuration_error() {
    let fixture = Fixture::new().with_keys(&["Gemini"]);
    fixture.repo.add_content_type("código", false, 9);
    let generator = Arc::new(MockContentGenerator::new().respond("Gemini", "X"));

    let (result, events) = run(&fixture, generator.clone()).await;

    assert!(matches!(result, Err(GenerationError::NoEligibleTypes)));
    assert!(generator.calls().is_empty());
    assert_eq!(count_kind(&events, "step_started"), 0);
    assert_eq!(
        events,
        vec![ProgressEvent::Aborted {
            status: "error",
            message: "No hay tipos de contenido habilitados para IA.".to_string()
        }]
    );
}

#[tokio::test]
async fn no_stored_keys_is_a_configuration_error() {
    let fixture = Fixture::new().with_types(&["definicion"]);
    fixture.repo.set_credential("GOOGLE_API_KEY", "   ");
    let generator = Arc::new(MockContentGenerator::new());

    let (result, events) = run(&fixture, generator.clone()).await;

    assert!(matches!(result, Err(GenerationError::NoUsableProviders)));
    assert!(generator.calls().is_empty());
    assert_eq!(count_kind(&events, "types_discovered"), 1);
    assert_eq!(count_kind(&events, "aborted"), 1);
}

#[tokio::test]
async fn unknown_topic_aborts_before_any_step() {
    let fixture = Fixture::new().with_types(&["definicion"]).with_keys(&["Gemini"]);
    let generator = Arc::new(MockContentGenerator::new().respond("Gemini", "X"));
    let (tx, rx) = mpsc::channel(64);

    let result = fixture.orchestrator(generator.clone()).run(9999, tx).await;
    let events = collect_events(rx).await;

    assert!(matches!(result, Err(GenerationError::TopicNotFound(9999))));
    assert!(generator.calls().is_empty());
    assert_eq!(count_kind(&events, "progress"), 0);
}

#[tokio::test]
async fn runs_the_full_cross_product_in_order() {
    let fixture = Fixture::new()
        .with_types(&["definicion", "ejemplo", "tip"])
        .with_keys(&["DeepSeek", "Gemini"]);
    let generator = Arc::new(
        MockContentGenerator::new()
            .respond("Gemini", "g")
            .respond("DeepSeek", "d"),
    );

    let (result, events) = run(&fixture, generator.clone()).await;

    assert_eq!(
        result.unwrap(),
        RunSummary {
            succeeded: 6,
            failed: 0
        }
    );
    assert_eq!(count_kind(&events, "step_started"), 6);
    assert_eq!(count_kind(&events, "progress"), 6);
    assert_eq!(count_kind(&events, "finished"), 1);
    assert_eq!(count_kind(&events, "hint"), 0);

    let order: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::StepStarted {
                content_type,
                provider,
            } => Some(format!("{}/{}", content_type, provider)),
            _ => None,
        })
        .collect();
    assert_eq!(
        order,
        [
            "definicion/Gemini",
            "definicion/DeepSeek",
            "ejemplo/Gemini",
            "ejemplo/DeepSeek",
            "tip/Gemini",
            "tip/DeepSeek",
        ]
    );

    let progress: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress {
                completed,
                total,
                percentage,
            } => Some((*completed, *total, *percentage)),
            _ => None,
        })
        .collect();
    assert_eq!(progress.first(), Some(&(1, 6, 17)));
    assert_eq!(progress.last(), Some(&(6, 6, 100)));

    let keys: Vec<_> = generator.calls().into_iter().map(|c| c.api_key).collect();
    assert_eq!(keys[0], "gemini-key");
    assert_eq!(keys[1], "deepseek-key");
}

#[tokio::test]
async fn failures_are_counted_and_the_loop_continues() {
    let fixture = Fixture::new()
        .with_types(&["definicion", "tip"])
        .with_keys(&["Gemini", "Claude"]);
    let generator = Arc::new(
        MockContentGenerator::new()
            .respond("Gemini", "Texto")
            .fail("Claude", "La API Key es inválida o ha sido revocada."),
    );

    let (result, events) = run(&fixture, generator).await;

    assert_eq!(
        result.unwrap(),
        RunSummary {
            succeeded: 2,
            failed: 2
        }
    );
    assert_eq!(count_kind(&events, "progress"), 4);
    assert_eq!(count_kind(&events, "hint"), 0);

    let failure = events
        .iter()
        .find_map(|e| match e {
            ProgressEvent::StepFailed { message, .. } => Some(message.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        failure,
        "Error in Claude: La API Key es inválida o ha sido revocada."
    );
    assert_eq!(fixture.repo.blocks(fixture.topic_id).len(), 2);
}

#[tokio::test]
async fn all_failures_end_with_free_tier_hint() {
    let fixture = Fixture::new()
        .with_types(&["definicion"])
        .with_keys(&["Claude", "OpenAI"]);
    let generator = Arc::new(
        MockContentGenerator::new()
            .fail("Claude", "Tu balance de créditos en Anthropic es muy bajo.")
            .fail("OpenAI", "Límite de cuota excedido. Revisa tu plan y facturación."),
    );

    let (result, events) = run(&fixture, generator).await;

    assert_eq!(
        result.unwrap(),
        RunSummary {
            succeeded: 0,
            failed: 2
        }
    );
    let tail: Vec<_> = events.iter().rev().take(2).map(|e| e.kind()).collect();
    assert_eq!(tail, ["hint", "finished"]);
    assert!(fixture.repo.blocks(fixture.topic_id).is_empty());
}

#[tokio::test]
async fn persistence_failure_fails_only_that_step() {
    let fixture = Fixture::new()
        .with_types(&["definicion", "tip"])
        .with_keys(&["Gemini"]);
    fixture.repo.fail_writes(true);
    let generator = Arc::new(MockContentGenerator::new().respond("Gemini", "X"));

    let (result, events) = run(&fixture, generator.clone()).await;

    assert_eq!(
        result.unwrap(),
        RunSummary {
            succeeded: 0,
            failed: 2
        }
    );
    assert_eq!(generator.calls().len(), 2);
    assert_eq!(count_kind(&events, "step_failed"), 2);
    assert_eq!(count_kind(&events, "finished"), 1);
}

#[tokio::test]
async fn context_is_built_once_before_the_first_step() {
    let fixture = Fixture::new()
        .with_types(&["definicion"])
        .with_keys(&["Gemini", "Claude"]);
    let generator = Arc::new(
        MockContentGenerator::new()
            .respond("Gemini", "Aporte de Gemini")
            .respond("Claude", "Aporte de Claude"),
    );

    let (_, _) = run(&fixture, generator.clone()).await;

    let calls = generator.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].prompt.contains("Para el tema 'Variables'"));
    assert!(calls[0].prompt.contains("'Vacío'"));
    // Claude sees the snapshot, not Gemini's contribution.
    assert_eq!(calls[0].prompt, calls[1].prompt);
}

#[tokio::test]
async fn run_completes_after_listener_disconnects() {
    let fixture = Fixture::new()
        .with_types(&["definicion", "tip"])
        .with_keys(&["Gemini"]);
    let generator = Arc::new(MockContentGenerator::new().respond("Gemini", "X"));
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let result = fixture
        .orchestrator(generator)
        .run(fixture.topic_id, tx)
        .await;

    assert_eq!(result.unwrap().succeeded, 2);
    assert_eq!(fixture.repo.blocks(fixture.topic_id).len(), 2);
}
