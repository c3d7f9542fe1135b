//! End-to-end scenarios for the coordinator's event loop (S1-S6).
//!
//! Each scenario wires a real [`CoordinatorActor`] against the in-memory
//! test doubles in `common`, drives it through its public
//! [`CoordinatorHandle`], and asserts on what the test client observed —
//! exercising the dispatcher, scheduler, supervisor, and hooks together the
//! way a production client/calculator pair would.

mod common;

use chunkmesh_core::{calc_fn, hook_fn, CalcOutcome, Chunk, ClientId, JobRef};
use chunkmesh_coordinator::CoordinatorActor;
use common::{FixedCpuCounter, TestClient, TestRegistry};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn chunk(
    client: &ClientId,
    job_ref: &str,
    seq: u64,
    data: Vec<serde_json::Value>,
    calc: Arc<dyn chunkmesh_core::Calc>,
) -> Chunk {
    Chunk {
        client: client.clone(),
        job_ref: JobRef(job_ref.to_string()),
        seq,
        pre: None,
        calc,
        post: None,
        data,
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F, what: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for: {what}"));
}

#[tokio::test]
async fn s1_fast_happy_path() {
    let client = TestClient::new("client-a");
    let registry = TestRegistry::new(vec![client.clone()]);

    let handle = CoordinatorActor::spawn(
        chunkmesh_core::ServerId("s1".into()),
        "cluster",
        &registry,
        &FixedCpuCounter(2),
        4,
    )
    .await
    .unwrap();

    let double = calc_fn(|v: serde_json::Value| async move {
        Ok(json!(v.as_i64().unwrap() * 2))
    });
    let chunks: Vec<Chunk> = (0..10)
        .map(|i| chunk(&client.id(), "job-1", i, vec![json!(i as i64)], double.clone()))
        .collect();

    handle.process_chunks(client.clone(), chunks).await.unwrap();

    wait_until(|| client.calc_done_calls().len() == 10, "10 calc_done calls").await;

    for out in client.calc_done_calls() {
        assert_eq!(out.out_data.len(), 1);
        match &out.out_data[0] {
            CalcOutcome::Ok(v) => assert_eq!(v.as_i64().unwrap(), out.seq as i64 * 2),
            CalcOutcome::Fail { .. } => panic!("expected success"),
        }
    }
}

#[tokio::test]
async fn s2_permanent_failure_retries_then_synthesizes() {
    let client = TestClient::new("client-b");
    let registry = TestRegistry::new(vec![client.clone()]);

    let handle = CoordinatorActor::spawn(
        chunkmesh_core::ServerId("s2".into()),
        "cluster",
        &registry,
        &FixedCpuCounter(4),
        4,
    )
    .await
    .unwrap();

    let spawn_counts: Arc<Mutex<std::collections::HashMap<i64, usize>>> =
        Arc::new(Mutex::new(std::collections::HashMap::new()));
    let crashes = {
        let spawn_counts = spawn_counts.clone();
        calc_fn(move |v: serde_json::Value| {
            let spawn_counts = spawn_counts.clone();
            async move {
                *spawn_counts.lock().unwrap().entry(v.as_i64().unwrap()).or_insert(0) += 1;
                panic!("calculator crashed");
                #[allow(unreachable_code)]
                Ok(json!(null))
            }
        })
    };
    let chunks = vec![
        chunk(&client.id(), "job-2", 0, vec![json!(1)], crashes.clone()),
        chunk(&client.id(), "job-2", 1, vec![json!(2)], crashes),
    ];

    handle.process_chunks(client.clone(), chunks).await.unwrap();

    wait_until(|| client.calc_done_calls().len() == 2, "2 synthesized calc_done calls").await;

    for out in client.calc_done_calls() {
        assert_eq!(out.out_data.len(), 1);
        match &out.out_data[0] {
            CalcOutcome::Fail { reason } => assert!(!reason.is_empty()),
            CalcOutcome::Ok(_) => panic!("expected permanent failure"),
        }
    }

    // Testable Property 4 (SPEC_FULL.md §8): each permanently-failing chunk
    // is spawned exactly MAXATTEMPTS + 1 times (the initial attempt plus two
    // retries) before its failure is surfaced.
    let counts = spawn_counts.lock().unwrap();
    assert_eq!(counts.len(), 2, "expected both chunks to have been spawned at all");
    for (&datum, &count) in counts.iter() {
        assert_eq!(
            count,
            chunkmesh_coordinator::MAX_ATTEMPTS as usize + 1,
            "chunk with datum {datum} should have been spawned exactly MAX_ATTEMPTS+1 times"
        );
    }
}

#[tokio::test]
async fn s3_dynamic_resizing_does_not_cancel_running_workers() {
    let client = TestClient::new("client-c");
    let registry = TestRegistry::new(vec![client.clone()]);

    let handle = CoordinatorActor::spawn(
        chunkmesh_core::ServerId("s3".into()),
        "cluster",
        &registry,
        &FixedCpuCounter(4),
        10,
    )
    .await
    .unwrap();

    let slow = calc_fn(|v: serde_json::Value| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(v)
    });
    let chunks: Vec<Chunk> = (0..10)
        .map(|i| chunk(&client.id(), "job-3", i, vec![json!(i as i64)], slow.clone()))
        .collect();

    handle.process_chunks(client.clone(), chunks).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if handle.get_worker_number().await.unwrap() == (4, 4) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pool never saturated at 4/4");

    let reply = handle.change_worker_number(1).await.unwrap();
    assert!(matches!(
        reply,
        chunkmesh_coordinator::ChangeWorkerNumberReply::Ok
    ));

    wait_until(|| client.calc_done_calls().len() == 10, "all 10 chunks eventually complete").await;

    let (workers, max_workers) = handle.get_worker_number().await.unwrap();
    assert_eq!(max_workers, 1);
    assert!(workers <= 1);
}

#[tokio::test]
async fn s4_fair_interleaving_never_runs_one_job_two_ahead_of_the_other() {
    let client = TestClient::new("client-d");
    let registry = TestRegistry::new(vec![client.clone()]);

    let handle = CoordinatorActor::spawn(
        chunkmesh_core::ServerId("s4".into()),
        "cluster",
        &registry,
        &FixedCpuCounter(1),
        10,
    )
    .await
    .unwrap();

    let order: Arc<Mutex<Vec<(String, i64)>>> = Arc::new(Mutex::new(Vec::new()));
    let recording = {
        let order = order.clone();
        calc_fn(move |v: serde_json::Value| {
            let order = order.clone();
            async move {
                let tag = v.as_str().unwrap().to_string();
                let (job, seq) = tag.split_once(':').unwrap();
                order.lock().unwrap().push((job.to_string(), seq.parse().unwrap()));
                Ok(v)
            }
        })
    };

    let batch_a: Vec<Chunk> = (1..=3)
        .map(|i| chunk(&client.id(), "job-a", i, vec![json!(format!("a:{i}"))], recording.clone()))
        .collect();
    let batch_b: Vec<Chunk> = (1..=3)
        .map(|i| chunk(&client.id(), "job-b", i, vec![json!(format!("b:{i}"))], recording.clone()))
        .collect();

    handle.process_chunks(client.clone(), batch_a).await.unwrap();
    handle.process_chunks(client.clone(), batch_b).await.unwrap();

    wait_until(|| order.lock().unwrap().len() == 6, "all 6 chunks observed").await;

    let observed = order.lock().unwrap().clone();
    assert_eq!(observed.len(), 6);

    // SPEC_FULL.md §5: "between senders no order is assumed; fairness across
    // jobs is re-established by the dispatcher's round-robin, not by message
    // ordering." The two `process_chunks` calls below are separate sends, so
    // the exact interleaving of which message the event loop folds into the
    // backlog first isn't guaranteed — only Testable Property 2 from §8 is:
    // no job is ever two chunks ahead of the other.
    let mut count_a = 0i32;
    let mut count_b = 0i32;
    for (job, _seq) in &observed {
        match job.as_str() {
            "a" => count_a += 1,
            "b" => count_b += 1,
            other => panic!("unexpected job tag {other}"),
        }
        assert!(
            (count_a - count_b).abs() <= 1,
            "one job ran two chunks ahead of the other: {observed:?}"
        );
    }
    assert_eq!((count_a, count_b), (3, 3));

    // Within each job, chunks are still consumed head-first regardless of
    // interleaving.
    let seqs_for = |job: &str| -> Vec<i64> {
        observed
            .iter()
            .filter(|(j, _)| j == job)
            .map(|(_, seq)| *seq)
            .collect()
    };
    assert_eq!(seqs_for("a"), vec![1, 2, 3]);
    assert_eq!(seqs_for("b"), vec![1, 2, 3]);
}

#[tokio::test]
async fn s5_refill_trigger_on_last_chunk_of_batch() {
    let client = TestClient::new("client-e");
    let registry = TestRegistry::new(vec![client.clone()]);

    let handle = CoordinatorActor::spawn(
        chunkmesh_core::ServerId("s5".into()),
        "cluster",
        &registry,
        &FixedCpuCounter(4),
        4,
    )
    .await
    .unwrap();

    let identity = calc_fn(|v: serde_json::Value| async move { Ok(v) });
    let chunks: Vec<Chunk> = (0..4)
        .map(|i| chunk(&client.id(), "job-5", i, vec![json!(i as i64)], identity.clone()))
        .collect();

    handle.process_chunks(client.clone(), chunks).await.unwrap();

    wait_until(|| client.calc_done_calls().len() == 4, "all 4 chunks complete").await;

    let refills = client.send_chunks_calls();
    assert!(
        refills.iter().any(|c| c.n == 4),
        "expected a send_chunks(self, 4) refill request, got {refills:?}"
    );
}

#[tokio::test]
async fn s6_pre_and_post_hooks_run_exactly_once() {
    let client = TestClient::new("client-f");
    let registry = TestRegistry::new(vec![client.clone()]);

    let handle = CoordinatorActor::spawn(
        chunkmesh_core::ServerId("s6".into()),
        "cluster",
        &registry,
        &FixedCpuCounter(4),
        4,
    )
    .await
    .unwrap();

    let pre_counter = Arc::new(AtomicUsize::new(0));
    let post_counter = Arc::new(AtomicUsize::new(0));

    let pre = {
        let pre_counter = pre_counter.clone();
        hook_fn(move || {
            let pre_counter = pre_counter.clone();
            async move {
                pre_counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    };
    let post = {
        let post_counter = post_counter.clone();
        hook_fn(move || {
            let post_counter = post_counter.clone();
            async move {
                post_counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let identity = calc_fn(|v: serde_json::Value| async move { Ok(v) });
    let job_ref = "job-6";
    let mut first_batch = vec![chunk(&client.id(), job_ref, 0, vec![json!(1)], identity.clone())];
    first_batch[0].pre = Some(pre.clone());
    let mut second_batch = vec![chunk(&client.id(), job_ref, 1, vec![json!(2)], identity)];
    second_batch[0].pre = Some(pre);

    handle.process_chunks(client.clone(), first_batch).await.unwrap();
    handle.process_chunks(client.clone(), second_batch).await.unwrap();

    wait_until(|| client.calc_done_calls().len() == 2, "both chunks complete").await;
    assert_eq!(pre_counter.load(Ordering::SeqCst), 1);

    handle
        .job_cleanup(client.id(), JobRef(job_ref.to_string()), Some(post))
        .await
        .unwrap();

    wait_until(|| post_counter.load(Ordering::SeqCst) == 1, "post hook ran").await;
    assert_eq!(post_counter.load(Ordering::SeqCst), 1);
}
