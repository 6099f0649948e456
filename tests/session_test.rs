mod helpers;

use std::sync::atomic::Ordering;

use helpers::{row, session_with, test_session, FakeProvider, NATIVE_DIMS, TEST_MODEL};
use scatterbrain::embedding::EncoderAvailability;
use scatterbrain::pipeline::OverflowPolicy;
use scatterbrain::ErrorKind;

#[test]
fn embed_and_append_grows_corpus() {
    let mut session = test_session();
    let first = session
        .embed_and_append(row("hello world", "greeting"), "text", OverflowPolicy::Truncate)
        .unwrap();
    session
        .embed_and_append(row("goodbye", "farewell"), "text", OverflowPolicy::Truncate)
        .unwrap();

    assert_eq!(first.len(), NATIVE_DIMS);
    assert_eq!(session.corpus().len(), 2);
    assert_eq!(session.corpus().items()[0].embedding, first);
    assert_eq!(session.corpus().items()[1].row.text("category").unwrap(), "farewell");
}

#[test]
fn missing_field_leaves_corpus_unchanged() {
    let mut session = test_session();
    session
        .embed_and_append(row("kept", "a"), "text", OverflowPolicy::Truncate)
        .unwrap();

    let err = session
        .embed_and_append(row("dropped", "a"), "body", OverflowPolicy::Truncate)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(session.corpus().len(), 1);
}

#[test]
fn average_matches_truncate_for_short_text() {
    let mut session = test_session();
    let truncated = session
        .embed_and_append(row("short text", "a"), "text", OverflowPolicy::Truncate)
        .unwrap();
    let averaged = session
        .embed_and_append(row("short text", "a"), "text", OverflowPolicy::Average)
        .unwrap();
    assert_eq!(truncated, averaged);
}

#[test]
fn average_sees_text_past_the_context_window() {
    let mut session = test_session();
    // 'a' and 'b' land in different buckets; the encoder only sees 16 chars.
    let text = format!("{}{}", "a".repeat(16), "b".repeat(16));
    let truncated = session
        .embed_and_append(row(&text, "x"), "text", OverflowPolicy::Truncate)
        .unwrap();
    let averaged = session
        .embed_and_append(row(&text, "x"), "text", OverflowPolicy::Average)
        .unwrap();

    let b_bucket = u32::from('b') as usize % NATIVE_DIMS;
    assert_eq!(truncated[b_bucket], 0.0);
    assert!(averaged[b_bucket] > 0.0);
    assert_eq!(session.corpus().len(), 2);
}

#[test]
fn closest_label_on_empty_reference_set() {
    let mut session = test_session();
    let err = session.find_closest("anything").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyReferenceSet);
}

#[test]
fn closest_label_prefers_first_on_tie() {
    let mut session = test_session();
    session.embed_reference("zzz").unwrap();
    // Same characters, same bag-of-characters vector.
    session.embed_reference("abc").unwrap();
    session.embed_reference("cba").unwrap();

    assert_eq!(session.find_closest("bca").unwrap(), "abc");
    assert_eq!(session.find_closest("zz").unwrap(), "zzz");
    assert_eq!(session.references().len(), 3);
}

#[test]
fn project_rejects_bad_dimensions_and_small_corpus() {
    let mut session = test_session();
    session
        .embed_and_append(row("only one", "a"), "text", OverflowPolicy::Truncate)
        .unwrap();

    let err = session.project(2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientSamples);

    session
        .embed_and_append(row("now two", "a"), "text", OverflowPolicy::Truncate)
        .unwrap();
    for dims in [0, 1, 4] {
        let err = session.project(dims).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError, "dims {dims}");
    }

    let points = session.project(3).unwrap();
    assert_eq!(points.len(), 2);
    assert!(points.iter().all(|p| p.coordinates.len() == 3));
    assert_eq!(points[1].source_index, 1);
}

#[test]
fn plot_requires_fresh_projection() {
    let mut session = test_session();
    for text in ["one", "two"] {
        session
            .embed_and_append(row(text, "a"), "text", OverflowPolicy::Truncate)
            .unwrap();
    }

    let err = session.assemble_plot("text", None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlignmentError);

    session.project(2).unwrap();
    assert!(session.assemble_plot("text", None, None).is_ok());

    session
        .embed_and_append(row("three", "b"), "text", OverflowPolicy::Truncate)
        .unwrap();
    let err = session.assemble_plot("text", None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlignmentError);

    session.project(2).unwrap();
    let plot = session.assemble_plot("text", None, None).unwrap();
    assert_eq!(plot.groups[0].points.len(), 3);
}

#[test]
fn plot_groups_by_category_in_first_seen_order() {
    let mut session = test_session();
    for (text, cat) in [("x", "a"), ("y", "b"), ("z", "a")] {
        session
            .embed_and_append(row(text, cat), "text", OverflowPolicy::Truncate)
            .unwrap();
    }
    session.project(2).unwrap();

    let plot = session
        .assemble_plot("text", Some("category"), Some("viridis"))
        .unwrap();
    assert_eq!(plot.dimensions, 2);
    assert_eq!(plot.groups.len(), 2);
    assert_eq!(plot.groups[0].category.as_deref(), Some("a"));
    assert_eq!(plot.groups[1].category.as_deref(), Some("b"));
    let indices: Vec<usize> = plot.groups[0].points.iter().map(|p| p.source_index).collect();
    assert_eq!(indices, vec![0, 2]);
    assert_eq!(plot.groups[1].points[0].label, "y");
    assert_ne!(plot.groups[0].color, plot.groups[1].color);

    let err = session
        .assemble_plot("text", None, Some("rainbow"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
}

#[test]
fn reset_clears_everything_and_is_idempotent() {
    let provider = FakeProvider::cached();
    let mut session = session_with(provider.clone());
    for text in ["one", "two"] {
        session
            .embed_and_append(row(text, "a"), "text", OverflowPolicy::Truncate)
            .unwrap();
    }
    session.embed_reference("label").unwrap();
    session.project(2).unwrap();

    session.reset();
    session.reset();

    assert!(session.corpus().is_empty());
    assert!(session.references().is_empty());
    assert_eq!(
        session.assemble_plot("text", None, None).unwrap_err().kind(),
        ErrorKind::AlignmentError
    );
    assert_eq!(session.encoder_spec().unwrap().model, TEST_MODEL);

    // The encoder is reloaded lazily after a reset.
    let loads = provider.loads.load(Ordering::SeqCst);
    session
        .embed_and_append(row("again", "a"), "text", OverflowPolicy::Truncate)
        .unwrap();
    assert_eq!(provider.loads.load(Ordering::SeqCst), loads + 1);
}

#[test]
fn switching_model_with_data_is_rejected() {
    let mut session = test_session();
    session.set_encoder_config(TEST_MODEL, None).unwrap();
    session
        .embed_and_append(row("text", "a"), "text", OverflowPolicy::Truncate)
        .unwrap();

    // Re-selecting the active model is a no-op.
    session.set_encoder_config(TEST_MODEL, None).unwrap();

    let err = session.set_encoder_config("other/model", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    assert_eq!(session.encoder_spec().unwrap().model, TEST_MODEL);

    session.reset();
    session.set_encoder_config("other/model", None).unwrap();
    assert_eq!(session.encoder_spec().unwrap().model, "other/model");
}

#[test]
fn set_model_validates_input() {
    let mut session = test_session();
    assert_eq!(
        session.set_encoder_config("  ", None).unwrap_err().kind(),
        ErrorKind::ConfigurationError
    );
    assert_eq!(
        session.set_encoder_config(TEST_MODEL, Some(0)).unwrap_err().kind(),
        ErrorKind::ConfigurationError
    );
}

#[test]
fn requested_dimensions_truncate_embeddings() {
    let mut session = test_session();
    session.set_encoder_config(TEST_MODEL, Some(4)).unwrap();
    let embedding = session
        .embed_and_append(row("abcdefgh", "a"), "text", OverflowPolicy::Average)
        .unwrap();
    assert_eq!(embedding.len(), 4);
    assert_eq!(session.corpus().dimension(), Some(4));
}

#[test]
fn check_encoder_reports_each_state() {
    let provider = FakeProvider::empty();
    let mut session = session_with(provider.clone()).with_default_encoder(None);
    assert_eq!(session.check_encoder().unwrap(), EncoderAvailability::NotSpecified);

    session.set_encoder_config(TEST_MODEL, None).unwrap();
    assert_eq!(session.check_encoder().unwrap(), EncoderAvailability::NotDownloaded);

    provider.cached.store(true, Ordering::SeqCst);
    assert_eq!(session.check_encoder().unwrap(), EncoderAvailability::Loaded);
}

#[test]
fn check_encoder_surfaces_load_failures() {
    let provider = FakeProvider::cached();
    provider.fail_load.store(true, Ordering::SeqCst);
    let mut session = session_with(provider);
    let err = session.check_encoder().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncodingError);
    assert!(err.to_string().contains("corrupt model files"));
}

#[test]
fn embedding_without_download_is_unavailable() {
    let provider = FakeProvider::empty();
    let mut session = session_with(provider.clone());

    let err = session
        .embed_and_append(row("text", "a"), "text", OverflowPolicy::Truncate)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncoderUnavailable);
    assert!(session.corpus().is_empty());

    session.download_encoder().unwrap();
    assert!(provider.cached.load(Ordering::SeqCst));
    session
        .embed_and_append(row("text", "a"), "text", OverflowPolicy::Truncate)
        .unwrap();
    assert_eq!(session.corpus().len(), 1);
}

#[test]
fn failed_download_is_unavailable() {
    let provider = FakeProvider::empty();
    provider.fail_fetch.store(true, Ordering::SeqCst);
    let mut session = session_with(provider);

    let err = session.download_encoder().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncoderUnavailable);
    assert!(err.to_string().contains("network unreachable"));
}

#[test]
fn operations_without_model_are_configuration_errors() {
    let mut session = session_with(FakeProvider::cached()).with_default_encoder(None);
    assert_eq!(
        session.download_encoder().unwrap_err().kind(),
        ErrorKind::ConfigurationError
    );
    assert_eq!(
        session.embed_reference("label").unwrap_err().kind(),
        ErrorKind::ConfigurationError
    );
}

#[test]
fn neighbor_graph_projection_end_to_end() {
    use std::sync::Arc;

    use scatterbrain::pipeline::ChunkParams;
    use scatterbrain::plot::PlotOptions;
    use scatterbrain::projection::PacmapProjector;
    use scatterbrain::Session;

    let mut session = Session::new(
        FakeProvider::cached(),
        Arc::new(PacmapProjector::default()),
        ChunkParams::default(),
        PlotOptions::default(),
    )
    .with_default_encoder(Some(helpers::test_spec()));

    // Ten neighbours by default, so eleven items are needed.
    for i in 0..5 {
        let text = format!("a{}", "e".repeat(i));
        session
            .embed_and_append(row(&text, "first"), "text", OverflowPolicy::Truncate)
            .unwrap();
        let text = format!("{}{}", "bc".repeat(i + 1), "d");
        session
            .embed_and_append(row(&text, "second"), "text", OverflowPolicy::Truncate)
            .unwrap();
    }
    assert_eq!(
        session.project(2).unwrap_err().kind(),
        ErrorKind::InsufficientSamples
    );

    for text in ["abc", "bcd"] {
        session
            .embed_and_append(row(text, "third"), "text", OverflowPolicy::Truncate)
            .unwrap();
    }
    let points = session.project(2).unwrap();
    assert_eq!(points.len(), 12);
    assert!(points
        .iter()
        .all(|p| p.coordinates.len() == 2 && p.coordinates.iter().all(|c| c.is_finite())));

    let plot = session.assemble_plot("text", Some("category"), None).unwrap();
    assert_eq!(plot.groups.len(), 3);
}
