//! Batch submission tests.
//!
//! Run with: `cargo test -p booking-runtime --test batch_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use booking_core::{
    BatchRow, BookingError, BookingStatus, ErrorKind, OfferingId, RequestSurface, SubjectId,
};
use booking_runtime::EngineConfig;
use booking_testing::{EngineFixture, ScriptedPaymentGate};

fn row(subject: SubjectId, key: &str) -> BatchRow {
    BatchRow {
        subject,
        choices: Vec::new(),
        idempotency_key: key.to_string(),
        request_surface: None,
        payer: None,
    }
}

/// Rows are processed in order; later rows land on the waitlist.
#[tokio::test]
async fn rows_fill_capacity_in_order() {
    let fx = EngineFixture::new();
    let offering = fx.offering("Football", 2).unwrap();
    let [a, b, c] = fx.subjects().unwrap();

    let outcome = fx
        .engine
        .submit_batch(
            offering,
            vec![row(a, "b-a"), row(b, "b-b"), row(c, "b-c")],
            RequestSurface::Import,
        )
        .await
        .unwrap();

    assert!(outcome.ok);
    assert_eq!(outcome.success_count + outcome.failed_count, 3);
    assert_eq!(outcome.failed_count, 0);

    let statuses: Vec<BookingStatus> = outcome
        .results
        .iter()
        .map(|r| r.booking.as_ref().unwrap().status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            BookingStatus::Confirmed,
            BookingStatus::Confirmed,
            BookingStatus::Waitlisted
        ]
    );
    assert_eq!(outcome.results[2].subject, Some(c));
    assert_eq!(
        outcome.results[2].booking.as_ref().unwrap().waitlist_position,
        Some(1)
    );
}

/// A failing row is reported without stopping the rest.
#[tokio::test]
async fn failing_row_does_not_stop_batch() {
    let fx = EngineFixture::new();
    let offering = fx.offering("Tennis", 2).unwrap();
    let [a, b] = fx.subjects().unwrap();
    let stranger = SubjectId::new();

    let outcome = fx
        .engine
        .submit_batch(
            offering,
            vec![
                row(a, "t-a"),
                row(stranger, "t-stranger"),
                row(a, "t-a-again"),
                row(b, "t-b"),
            ],
            RequestSurface::Staff,
        )
        .await
        .unwrap();

    assert!(!outcome.ok);
    assert_eq!((outcome.success_count, outcome.failed_count), (2, 2));

    let unknown = outcome.results[1].error.as_ref().unwrap();
    assert_eq!(unknown.kind, ErrorKind::Validation);
    assert!(!unknown.retryable);
    assert!(outcome.results[1].booking.is_none());

    let duplicate = outcome.results[2].error.as_ref().unwrap();
    assert_eq!(duplicate.kind, ErrorKind::DuplicateSubmission);

    // Failed rows consumed nothing.
    assert_eq!(
        outcome.results[3].booking.as_ref().unwrap().status,
        BookingStatus::Confirmed
    );
    assert_eq!(fx.engine.offering_snapshot(offering).unwrap().available, 0);
}

/// Rows inherit the batch surface unless they carry their own.
#[tokio::test]
async fn row_surface_defaults_to_batch_surface() {
    let fx = EngineFixture::new();
    let offering = fx.offering("Swimming", 5).unwrap();
    let [a, b] = fx.subjects().unwrap();

    let mut portal = row(b, "s-b");
    portal.request_surface = Some(RequestSurface::Portal);
    let outcome = fx
        .engine
        .submit_batch(offering, vec![row(a, "s-a"), portal], RequestSurface::Import)
        .await
        .unwrap();

    let surfaces: Vec<RequestSurface> = outcome
        .results
        .iter()
        .map(|r| {
            let id = r.booking.as_ref().unwrap().booking_id;
            fx.engine.booking_record(id).unwrap().request_surface
        })
        .collect();
    assert_eq!(surfaces, vec![RequestSurface::Import, RequestSurface::Portal]);
}

/// Replaying a batch replays each row instead of booking again.
#[tokio::test]
async fn replayed_batch_is_idempotent_per_row() {
    let fx = EngineFixture::new();
    let offering = fx.offering("Judo", 1).unwrap();
    let [a, b] = fx.subjects().unwrap();
    let rows = vec![row(a, "j-a"), row(b, "j-b")];

    let first = fx
        .engine
        .submit_batch(offering, rows.clone(), RequestSurface::Import)
        .await
        .unwrap();
    let second = fx
        .engine
        .submit_batch(offering, rows, RequestSurface::Import)
        .await
        .unwrap();

    assert_eq!(first, second);
    let snapshot = fx.engine.offering_snapshot(offering).unwrap();
    assert_eq!((snapshot.confirmed, snapshot.waitlist_length), (1, 1));
}

/// Invalid batches are refused before any row runs.
#[tokio::test]
async fn invalid_batches_are_refused_whole() {
    let fx = EngineFixture::with(
        EngineConfig {
            max_batch_rows: 2,
            ..EngineConfig::default()
        },
        ScriptedPaymentGate::new(),
    );
    let offering = fx.offering("Chess", 10).unwrap();
    let [a, b, c] = fx.subjects().unwrap();

    let missing = OfferingId::new();
    let err = fx
        .engine
        .submit_batch(missing, vec![row(a, "x-a")], RequestSurface::Api)
        .await
        .unwrap_err();
    assert_eq!(err, BookingError::UnknownOffering(missing));

    let err = fx
        .engine
        .submit_batch(offering, Vec::new(), RequestSurface::Api)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = fx
        .engine
        .submit_batch(
            offering,
            vec![row(a, "x-a"), row(b, "x-b"), row(c, "x-c")],
            RequestSurface::Api,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(fx.engine.offering_snapshot(offering).unwrap().confirmed, 0);
}
