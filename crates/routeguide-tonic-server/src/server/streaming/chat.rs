use crate::server::{notes::NoteRegistry, telemetry::increment_notes_appended};
use routeguide_tonic_core::{Error, Result, proto::RouteNote};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Drives one `RouteChat` call.
///
/// For every inbound note: look up (or create) the log for its exact location,
/// send the log's current contents to `outbound`, then append the note. Other
/// sessions may append between the snapshot and the append; whether the
/// caller sees those notes is not defined.
///
/// Returns the number of notes stored once the client closes its side.
/// Dropping `outbound` afterwards completes the response stream.
///
/// # Errors
///
/// - [`Error::RequestCancelled`] if the inbound stream fails or the outbound
///   receiver is gone. Notes already sent and stored stand.
/// - [`Error::ServiceShutdown`] if `cancel` fires first.
pub async fn route_chat<S>(
    notes: S,
    registry: &NoteRegistry,
    outbound: &mpsc::Sender<core::result::Result<RouteNote, Status>>,
    cancel: &CancellationToken,
) -> Result<usize>
where
    S: Stream<Item = core::result::Result<RouteNote, Status>> + Unpin,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::ServiceShutdown),
        stored = exchange(notes, registry, outbound) => stored,
    }
}

async fn exchange<S>(
    mut notes: S,
    registry: &NoteRegistry,
    outbound: &mpsc::Sender<core::result::Result<RouteNote, Status>>,
) -> Result<usize>
where
    S: Stream<Item = core::result::Result<RouteNote, Status>> + Unpin,
{
    let mut stored = 0;

    while let Some(next) = notes.next().await {
        let note = next.map_err(|_status| {
            #[cfg(feature = "tracing")]
            tracing::debug!("Inbound chat stream failed: {}", _status);
            Error::RequestCancelled
        })?;

        let log = registry.get_or_create(note.point());

        for previous in log.snapshot() {
            if outbound.send(Ok(previous)).await.is_err() {
                #[cfg(feature = "tracing")]
                tracing::debug!("Chat receiver dropped mid-snapshot");
                return Err(Error::RequestCancelled);
            }
        }

        log.append(note);
        increment_notes_appended();
        stored += 1;
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use routeguide_tonic_core::proto::Point;

    const HERE: Point = Point::new(1, 1);
    const THERE: Point = Point::new(2, 2);

    async fn run(
        registry: &NoteRegistry,
        notes: Vec<RouteNote>,
    ) -> (Result<usize>, Vec<String>) {
        let (tx, mut rx) = mpsc::channel(64);
        let inbound = tokio_stream::iter(notes.into_iter().map(Ok));
        let outcome = route_chat(inbound, registry, &tx, &CancellationToken::new()).await;
        drop(tx);

        let mut received = Vec::new();
        while let Some(note) = rx.recv().await {
            received.push(note.unwrap().message);
        }
        (outcome, received)
    }

    #[tokio::test]
    async fn echoes_prior_notes_at_same_location() {
        let registry = NoteRegistry::new();
        let (outcome, received) = run(
            &registry,
            vec![
                RouteNote::new(HERE, "first"),
                RouteNote::new(THERE, "second"),
                RouteNote::new(HERE, "third"),
                RouteNote::new(HERE, "fourth"),
            ],
        )
        .await;

        assert_eq!(outcome, Ok(4));
        assert_eq!(received, ["first", "first", "third"]);
    }

    #[tokio::test]
    async fn later_session_sees_earlier_sessions_in_order() {
        let registry = NoteRegistry::new();
        let (_, a) = run(&registry, vec![RouteNote::new(HERE, "from A")]).await;
        let (_, b) = run(&registry, vec![RouteNote::new(HERE, "from B")]).await;
        let (_, c) = run(&registry, vec![RouteNote::new(HERE, "from C")]).await;

        assert!(a.is_empty());
        assert_eq!(b, ["from A"]);
        assert_eq!(c, ["from A", "from B"]);
    }

    #[tokio::test]
    async fn notes_do_not_leak_across_locations() {
        let registry = NoteRegistry::new();
        let (outcome, _) = run(&registry, vec![RouteNote::new(HERE, "only here")]).await;
        assert_eq!(outcome, Ok(1));
        let (outcome, received) = run(&registry, vec![RouteNote::new(THERE, "elsewhere")]).await;

        assert_eq!(outcome, Ok(1));
        assert!(received.is_empty());
        assert!(registry.snapshot(&THERE).iter().all(|n| n.point() == THERE));
    }

    #[tokio::test]
    async fn dropped_receiver_abandons_without_append() {
        let registry = NoteRegistry::new();
        registry
            .get_or_create(HERE)
            .append(RouteNote::new(HERE, "existing"));

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let inbound = tokio_stream::iter(vec![Ok(RouteNote::new(HERE, "lost"))]);
        let outcome = route_chat(inbound, &registry, &tx, &CancellationToken::new()).await;

        assert_eq!(outcome, Err(Error::RequestCancelled));
        assert_eq!(registry.snapshot(&HERE).len(), 1);
    }

    #[tokio::test]
    async fn inbound_error_keeps_stored_notes() {
        let registry = NoteRegistry::new();
        let (tx, _rx) = mpsc::channel(8);
        let inbound = tokio_stream::iter(vec![
            Ok(RouteNote::new(HERE, "kept")),
            Err(Status::cancelled("client went away")),
        ]);
        let outcome = route_chat(inbound, &registry, &tx, &CancellationToken::new()).await;

        assert_eq!(outcome, Err(Error::RequestCancelled));
        assert_eq!(registry.snapshot(&HERE).len(), 1);
    }

    #[tokio::test]
    async fn shutdown_ends_idle_chat() {
        let registry = NoteRegistry::new();
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let inbound = tokio_stream::pending::<core::result::Result<RouteNote, Status>>();

        let outcome = route_chat(inbound, &registry, &tx, &cancel).await;
        assert_eq!(outcome, Err(Error::ServiceShutdown));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_sessions_store_every_note() {
        const SESSIONS: usize = 16;
        const NOTES: usize = 64;

        let registry = std::sync::Arc::new(NoteRegistry::new());
        let tasks: Vec<_> = (0..SESSIONS)
            .map(|session| {
                let registry = std::sync::Arc::clone(&registry);
                tokio::spawn(async move {
                    let (tx, mut rx) = mpsc::channel(64);
                    let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
                    let notes = (0..NOTES)
                        .map(|i| Ok(RouteNote::new(HERE, format!("{session}:{i}"))))
                        .collect::<Vec<_>>();
                    let outcome = route_chat(
                        tokio_stream::iter(notes),
                        &registry,
                        &tx,
                        &CancellationToken::new(),
                    )
                    .await;
                    drop(tx);
                    drain.await.unwrap();
                    outcome
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(NOTES));
        }
        assert_eq!(registry.snapshot(&HERE).len(), SESSIONS * NOTES);
        assert_eq!(registry.len(), 1);
    }
}
