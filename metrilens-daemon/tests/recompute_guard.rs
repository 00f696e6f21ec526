//! A recompute trigger that arrives while a pass is running is dropped

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use metrilens_broadcaster::{ReloadHub, Subscriber};
use metrilens_cache::{MetricsCache, MetricsNode, NodeMetrics};
use metrilens_daemon::recompute::{AnalysisUnit, MetricsAnalyzer, RecomputeOutcome, Recomputer};
use tempfile::TempDir;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::time::timeout;

/// Blocks inside `analyze` until the test releases it
struct GatedAnalyzer {
    entered: UnboundedSender<String>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl MetricsAnalyzer for GatedAnalyzer {
    fn analyze(&self, unit: &AnalysisUnit) -> Result<Option<MetricsNode>> {
        let _ = self.entered.send(unit.name.clone());
        self.release
            .lock()
            .map_err(|_| anyhow::anyhow!("gate poisoned"))?
            .recv()?;
        Ok(Some(MetricsNode::new(
            unit.name.as_str(),
            NodeMetrics {
                maintainability_index: 50.0,
                ..NodeMetrics::default()
            },
        )))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_recompute_is_skipped() {
    let tmp_dir = TempDir::new().unwrap();
    let hub = Arc::new(ReloadHub::new(tmp_dir.path().join("reload.sock")));
    hub.start().await.unwrap();

    let (entered_tx, mut entered_rx) = unbounded_channel();
    let (release_tx, release_rx) = mpsc::channel();
    let recomputer = Arc::new(Recomputer::new(
        MetricsCache::new(tmp_dir.path()),
        Arc::clone(&hub),
        Arc::new(GatedAnalyzer {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        }),
    ));

    let invalidations = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let counter = Arc::clone(&invalidations);
    let _subscriber = Subscriber::new(tmp_dir.path().join("reload.sock")).spawn(move || {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    timeout(Duration::from_secs(5), async {
        while hub.subscriber_count().await < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let first = {
        let recomputer = Arc::clone(&recomputer);
        tokio::spawn(async move { recomputer.recompute(&[AnalysisUnit::new("Core", "core")]).await })
    };

    let entered = timeout(Duration::from_secs(5), entered_rx.recv()).await.unwrap();
    assert_eq!(entered.as_deref(), Some("Core"));

    // First pass is parked inside the analyzer
    let second = recomputer.recompute(&[AnalysisUnit::new("Web", "web")]).await;
    assert_eq!(second, RecomputeOutcome::Skipped);

    release_tx.send(()).unwrap();
    let first = timeout(Duration::from_secs(5), first).await.unwrap().unwrap();
    assert_eq!(first, RecomputeOutcome::Completed { saved: 1, total: 1 });

    // The skipped trigger analyzed nothing and broadcast nothing
    assert!(entered_rx.try_recv().is_err());
    assert!(recomputer.cache().find_record("Web", "Web").is_none());
    assert_eq!(recomputer.cache().lookup("Core", "Core").maintainability_index, 50.0);

    timeout(Duration::from_secs(5), async {
        while invalidations.load(std::sync::atomic::Ordering::SeqCst) < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // The guard is released once the pass ends
    release_tx.send(()).unwrap();
    let third = recomputer.recompute(&[AnalysisUnit::new("Web", "web")]).await;
    assert_eq!(third, RecomputeOutcome::Completed { saved: 1, total: 1 });
    assert_eq!(invalidations_after(&invalidations, 2).await, 2);

    hub.stop().await.unwrap();
}

async fn invalidations_after(counter: &std::sync::atomic::AtomicU64, expected: u64) -> u64 {
    let _ = timeout(Duration::from_secs(5), async {
        while counter.load(std::sync::atomic::Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    counter.load(std::sync::atomic::Ordering::SeqCst)
}
