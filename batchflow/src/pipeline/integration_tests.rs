//! End-to-end tests for both orchestrators.

#[cfg(test)]
mod tests {
    use crate::context::RunContext;
    use crate::errors::{ErrorKind, OperatorError, PipelineError};
    use crate::hooks::{AfterHook, ContextSeedHook, FnAfterHook, FnBeforeHook};
    use crate::metrics::MetricsCollector;
    use crate::operators::{Batch, FnSource, FnTransform};
    use crate::pipeline::{Executor, Instrumented, Pipeline, PipelineState, RunOutcome};
    use crate::retry::{FixedDelay, RetryableSink, RetryableTransform, SkipAfterNAttempts};
    use crate::splitter::{FixedSizeSplitter, PredicatePartition};
    use crate::testing::{CollectingSink, FailingSink, FlakyTransform, PassthroughTransform, VecSource};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct RecordingHook {
        success: AtomicUsize,
        failure: AtomicUsize,
        interrupted: AtomicUsize,
        last_error: Mutex<Option<String>>,
    }

    impl RecordingHook {
        fn counts(&self) -> (usize, usize, usize) {
            (
                self.success.load(Ordering::SeqCst),
                self.failure.load(Ordering::SeqCst),
                self.interrupted.load(Ordering::SeqCst),
            )
        }
    }

    impl AfterHook for RecordingHook {
        fn name(&self) -> &str {
            "recording"
        }

        fn on_success(&self, _ctx: &RunContext, _metrics: &MetricsCollector) -> anyhow::Result<()> {
            self.success.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_failure(
            &self,
            _ctx: &RunContext,
            _metrics: &MetricsCollector,
            error: &PipelineError,
        ) -> anyhow::Result<()> {
            self.failure.fetch_add(1, Ordering::SeqCst);
            *self.last_error.lock() = Some(error.to_string());
            Ok(())
        }

        fn on_interrupted(&self, _ctx: &RunContext, _metrics: &MetricsCollector) -> anyhow::Result<()> {
            self.interrupted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn three_pairs() -> Arc<VecSource<i32>> {
        Arc::new(VecSource::new("reader", vec![vec![1, 2], vec![3, 4], vec![5, 6]]))
    }

    /// A source that never runs dry.
    fn endless(delay: Duration) -> FnSource<impl Fn(&RunContext) -> Result<Option<Batch<u64>>, OperatorError>> {
        let next = AtomicUsize::new(0);
        FnSource::new("endless", move |_ctx: &RunContext| {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            let n = next.fetch_add(1, Ordering::SeqCst) as u64;
            Ok::<_, OperatorError>(Some(vec![n]))
        })
    }

    // Pipeline

    #[test]
    fn test_three_batches_end_to_end() {
        let source = three_pairs();
        let transform = Arc::new(PassthroughTransform::new().named("noop"));
        let sink = Arc::new(CollectingSink::<i32>::new("writer"));
        let hook = Arc::new(RecordingHook::default());

        let pipeline = Pipeline::builder(source.clone())
            .name("e2e")
            .transform::<i32, _>(transform.clone())
            .sink(sink.clone())
            .after_hook(hook.clone())
            .build();
        assert_eq!(pipeline.state(), PipelineState::Init);

        let report = pipeline.run().unwrap();

        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.state, PipelineState::Stopped);
        assert_eq!(report.batches, 3);
        assert_eq!(report.records, 6);
        assert_eq!(sink.calls(), 3);
        assert_eq!(sink.items(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(hook.counts(), (1, 0, 0));

        let metrics = pipeline.metrics();
        assert_eq!(metrics.get("reader").unwrap().success_count, 4);
        assert_eq!(metrics.get("noop").unwrap().success_count, 3);
        assert_eq!(metrics.get("writer").unwrap().success_count, 3);
        assert_eq!(metrics.get("writer").unwrap().failure_count, 0);
        assert_eq!(report.operator("reader").unwrap().total_count, 4);
        assert_eq!(report.run_id, pipeline.context().run_id());
    }

    #[test]
    fn test_second_run_is_invalid_state() {
        let pipeline = Pipeline::builder(three_pairs()).build();
        pipeline.run().unwrap();

        let err = pipeline.run().unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn test_operator_failure_fails_run() {
        let source = three_pairs();
        let sink = Arc::new(FailingSink::new("writer"));
        let hook = Arc::new(RecordingHook::default());

        let pipeline = Pipeline::builder(source.clone())
            .sink(sink.clone())
            .after_hook(hook.clone())
            .build();

        let err = pipeline.run().unwrap_err();

        assert_eq!(err.operator_name(), Some("writer"));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(source.pulls(), 1);
        assert_eq!(source.remaining(), 2);
        assert_eq!(sink.calls(), 1);
        assert_eq!(hook.counts(), (0, 1, 0));
        assert_eq!(
            hook.last_error.lock().as_deref(),
            Some("Operator 'writer' failed: fatal error: writer rejected 2 record(s)")
        );
        assert_eq!(pipeline.metrics().get("writer").unwrap().failure_count, 1);

        let err = pipeline.run().unwrap_err();
        assert!(err.is_invalid_state());
    }

    #[test]
    fn test_source_failure_fails_run() {
        let source = FnSource::new("flaky-reader", |_ctx: &RunContext| {
            Err::<Option<Batch<i32>>, _>(OperatorError::new(ErrorKind::Connection, "refused"))
        });
        let pipeline = Pipeline::builder(source).build();

        let err = pipeline.run().unwrap_err();

        assert_eq!(err.operator_name(), Some("flaky-reader"));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(pipeline.metrics().get("flaky-reader").unwrap().failure_count, 1);
    }

    #[test]
    fn test_before_hook_failure_aborts_before_any_operator() {
        let source = three_pairs();
        let hook = Arc::new(RecordingHook::default());
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = order.clone();
        let second = order.clone();

        let pipeline = Pipeline::builder(source.clone())
            .before_hook(FnBeforeHook::new("first", move |_ctx: &RunContext| {
                first.lock().push("first");
                Ok(())
            }))
            .before_hook(FnBeforeHook::new("lock", move |_ctx: &RunContext| {
                second.lock().push("lock");
                anyhow::bail!("lock held by another run")
            }))
            .after_hook(hook.clone())
            .build();

        let err = pipeline.run().unwrap_err();

        assert!(matches!(&err, PipelineError::Hook { hook, .. } if hook == "lock"));
        assert_eq!(*order.lock(), vec!["first", "lock"]);
        assert_eq!(source.pulls(), 0);
        assert_eq!(hook.counts(), (0, 0, 0));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(pipeline.metrics().is_empty());
    }

    #[test]
    fn test_after_hook_error_does_not_change_outcome() {
        let hook = Arc::new(RecordingHook::default());
        let pipeline = Pipeline::builder(three_pairs())
            .after_hook(FnAfterHook::new("broken").on_success(|_ctx, _m| {
                anyhow::bail!("notification service down")
            }))
            .after_hook(hook.clone())
            .build();

        let report = pipeline.run().unwrap();

        assert!(report.is_completed());
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(hook.counts(), (1, 0, 0));
    }

    #[test]
    fn test_retry_recovers_inside_pipeline() {
        let flaky = Arc::new(FlakyTransform::new("enrich", 2));
        let sink = Arc::new(CollectingSink::<i32>::new("writer"));

        let pipeline = Pipeline::builder(VecSource::new("reader", vec![vec![7, 8]]))
            .transform::<i32, _>(
                RetryableTransform::new(flaky.clone())
                    .with_retry(FixedDelay::new(3, Duration::from_millis(50))),
            )
            .sink(sink.clone())
            .build();

        let start = Instant::now();
        pipeline.run().unwrap();

        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(flaky.calls(), 3);
        assert_eq!(sink.items(), vec![7, 8]);
        let enrich = pipeline.metrics().get("enrich").unwrap();
        assert_eq!((enrich.success_count, enrich.failure_count), (1, 0));
    }

    #[test]
    fn test_exhausted_retry_fails_pipeline() {
        let pipeline = Pipeline::builder(three_pairs())
            .transform::<i32, _>(
                RetryableTransform::new(FlakyTransform::new("enrich", 10))
                    .with_retry(FixedDelay::new(2, Duration::ZERO)),
            )
            .build();

        let err = pipeline.run().unwrap_err();

        match err {
            PipelineError::Operator { operator, source } => {
                assert_eq!(operator, "enrich");
                assert_eq!(source.attempts(), Some(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_skipped_sink_lets_run_complete() {
        let sink = Arc::new(FailingSink::new("writer"));
        let skipped = Arc::new(AtomicUsize::new(0));
        let skipped_clone = skipped.clone();

        let pipeline = Pipeline::builder(three_pairs())
            .sink(
                RetryableSink::new(sink.clone())
                    .with_retry(FixedDelay::new(2, Duration::ZERO))
                    .with_skip(SkipAfterNAttempts::new(2).with_listener(
                        move |_input: &[i32], _err| {
                            skipped_clone.fetch_add(1, Ordering::SeqCst);
                        },
                    )),
            )
            .build();

        let report = pipeline.run().unwrap();

        assert!(report.is_completed());
        assert_eq!(sink.calls(), 6);
        assert_eq!(skipped.load(Ordering::SeqCst), 3);
        assert_eq!(report.operator("writer").unwrap().success_count, 3);
    }

    #[test]
    fn test_fixed_size_split_processes_each_chunk() {
        let transform = Arc::new(PassthroughTransform::new());
        let sink = Arc::new(CollectingSink::<i32>::new("writer"));

        let pipeline = Pipeline::builder(VecSource::new("reader", vec![vec![1, 2, 3, 4, 5], vec![6]]))
            .splitter(FixedSizeSplitter::new(2).unwrap())
            .transform::<i32, _>(transform.clone())
            .sink(sink.clone())
            .build();

        let report = pipeline.run().unwrap();

        assert_eq!(sink.batches(), vec![vec![1, 2], vec![3, 4], vec![5], vec![6]]);
        assert_eq!(transform.calls(), 4);
        assert_eq!(report.batches, 2);
        assert_eq!(report.records, 6);
    }

    #[test]
    fn test_partition_split_groups_by_label() {
        let sink = Arc::new(CollectingSink::<String>::new("writer"));

        let pipeline = Pipeline::builder(VecSource::new(
            "reader",
            vec![vec!["eu:1".to_string(), "us:2".to_string(), "eu:3".to_string()]],
        ))
        .splitter(PredicatePartition::new(|s: &String| s[..2].to_string()))
        .sink(sink.clone())
        .build();

        pipeline.run().unwrap();

        assert_eq!(
            sink.batches(),
            vec![
                vec!["eu:1".to_string(), "eu:3".to_string()],
                vec!["us:2".to_string()]
            ]
        );
    }

    #[test]
    fn test_empty_batch_ends_stream() {
        let sink = Arc::new(CollectingSink::<i32>::new("writer"));
        let pipeline = Pipeline::builder(VecSource::new("reader", vec![vec![], vec![1]]))
            .sink(sink.clone())
            .build();

        let report = pipeline.run().unwrap();

        assert_eq!(report.batches, 0);
        assert_eq!(sink.calls(), 0);
        assert_eq!(pipeline.metrics().get("reader").unwrap().success_count, 1);
    }

    #[test]
    fn test_operators_share_context() {
        let sink = Arc::new(CollectingSink::<i64>::new("writer"));
        let pipeline = Pipeline::builder(VecSource::new("reader", vec![vec![1_i64, 2], vec![3]]))
            .before_hook(ContextSeedHook::new().with_property("factor", 10))
            .transform(FnTransform::new("scale", |batch: Batch<i64>, ctx: &RunContext| {
                let factor = ctx.get_as::<i64>("factor").unwrap_or(1);
                let seen = ctx.get_as::<i64>("seen").unwrap_or(0);
                ctx.set("seen", seen + batch.len() as i64);
                Ok(batch.into_iter().map(|x| x * factor).collect::<Vec<i64>>())
            }))
            .sink(sink.clone())
            .build();

        pipeline.run().unwrap();

        assert_eq!(sink.items(), vec![10, 20, 30]);
        assert_eq!(pipeline.context().get_as::<i64>("seen"), Some(3));
        assert_eq!(pipeline.context().batch_count(), 2);
    }

    #[test]
    fn test_graceful_shutdown_from_another_thread() {
        let sink = Arc::new(CollectingSink::<u64>::new("writer"));
        let hook = Arc::new(RecordingHook::default());
        let pipeline = Pipeline::builder(endless(Duration::from_millis(10)))
            .sink(sink.clone())
            .after_hook(hook.clone())
            .build();

        let report = std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                pipeline.shutdown();
            });
            pipeline.run().unwrap()
        });

        assert_eq!(report.outcome, RunOutcome::Interrupted);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert!(report.batches >= 1);
        assert_eq!(sink.calls() as u64, report.batches);
        assert_eq!(hook.counts(), (0, 0, 1));
    }

    #[test]
    fn test_shutdown_before_run() {
        let source = three_pairs();
        let pipeline = Pipeline::builder(source.clone()).build();
        pipeline.shutdown();
        assert_eq!(pipeline.state(), PipelineState::Init);

        let report = pipeline.run().unwrap();

        assert_eq!(report.outcome, RunOutcome::Interrupted);
        assert_eq!(source.pulls(), 0);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn test_await_termination() {
        let source =
            VecSource::new("reader", vec![vec![1], vec![2]]).with_delay(Duration::from_millis(20));
        let pipeline = Pipeline::builder(source).build();
        assert!(!pipeline.await_termination(Duration::from_millis(10)));

        std::thread::scope(|s| {
            let runner = s.spawn(|| pipeline.run());
            assert!(pipeline.await_termination(Duration::from_secs(5)));
            assert!(runner.join().unwrap().is_ok());
        });
        assert!(pipeline.await_termination(Duration::ZERO));
    }

    #[test]
    fn test_graceful_shutdown_passes_through_stopping() {
        let pipeline = Pipeline::builder(endless(Duration::ZERO))
            .transform::<u64, _>(PassthroughTransform::new().with_delay(Duration::from_millis(200)))
            .build();

        let (observed, report) = std::thread::scope(|s| {
            let requester = s.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                pipeline.shutdown();
                pipeline.state()
            });
            let report = pipeline.run().unwrap();
            (requester.join().unwrap(), report)
        });

        assert_eq!(observed, PipelineState::Stopping);
        assert_eq!(report.outcome, RunOutcome::Interrupted);
        assert_eq!(report.state, PipelineState::Stopped);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn test_operator_panic_fails_run() {
        let hook = Arc::new(RecordingHook::default());
        let pipeline = Pipeline::builder(three_pairs())
            .transform(FnTransform::new(
                "explode",
                |_batch: Batch<i32>, _ctx: &RunContext| -> Result<Batch<i32>, OperatorError> {
                    panic!("bad record")
                },
            ))
            .after_hook(hook.clone())
            .build();

        let err = pipeline.run().unwrap_err();

        assert_eq!(err.operator_name(), Some("explode"));
        assert!(err.to_string().contains("operator panicked: bad record"));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(pipeline.await_termination(Duration::ZERO));
        assert_eq!(hook.counts(), (0, 1, 0));
        assert_eq!(pipeline.metrics().get("explode").unwrap().failure_count, 1);
    }

    // AsyncPipeline

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_three_batches_end_to_end() {
        let source = three_pairs();
        let sink = Arc::new(CollectingSink::<i32>::new("writer"));
        let hook = Arc::new(RecordingHook::default());

        let pipeline = Pipeline::builder(source.clone())
            .name("async-e2e")
            .transform::<i32, _>(PassthroughTransform::new().named("noop"))
            .sink(sink.clone())
            .after_hook(hook.clone())
            .build_async(Executor::current().unwrap());

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(sink.batches(), vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
        assert_eq!(hook.counts(), (1, 0, 0));

        let metrics = pipeline.metrics();
        assert_eq!(metrics.get("reader").unwrap().success_count, 4);
        assert_eq!(metrics.get("noop").unwrap().success_count, 3);
        assert_eq!(metrics.get("writer").unwrap().success_count, 3);

        assert!(pipeline.run().await.unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_async_run_blocking_on_owned_executor() {
        let sink = Arc::new(CollectingSink::<u32>::new("writer"));
        let items: Vec<u32> = (0..100).collect();
        let pipeline = Pipeline::builder(VecSource::from_items("reader", items.clone(), 7))
            .transform(FnTransform::new("double", |b: Batch<u32>, _ctx: &RunContext| {
                Ok(b.into_iter().map(|x| x * 2).collect::<Vec<u32>>())
            }))
            .sink(sink.clone())
            .build_async(Executor::new(2, 4).unwrap());

        let report = pipeline.run_blocking().unwrap();

        assert_eq!(report.batches, 15);
        assert_eq!(sink.items(), items.iter().map(|x| x * 2).collect::<Vec<_>>());
        assert!(pipeline.executor().is_owned());
    }

    #[tokio::test]
    async fn test_async_failure_short_circuits_chain() {
        let sink = Arc::new(CollectingSink::<i32>::new("writer"));
        let hook = Arc::new(RecordingHook::default());

        let pipeline = Pipeline::builder(three_pairs())
            .transform::<i32, _>(FlakyTransform::new("enrich", 1).with_kind(ErrorKind::InvalidData))
            .sink(sink.clone())
            .after_hook(hook.clone())
            .build_async(Executor::current().unwrap());

        let err = pipeline.run().await.unwrap_err();

        assert_eq!(err.operator_name(), Some("enrich"));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(sink.calls(), 0);
        assert!(pipeline.metrics().get("writer").is_none());
        assert_eq!(pipeline.metrics().get("enrich").unwrap().failure_count, 1);
        assert_eq!(hook.counts(), (0, 1, 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_shutdown_now_abandons_in_flight_batch() {
        let sink = Arc::new(CollectingSink::<u64>::new("writer"));
        let hook = Arc::new(RecordingHook::default());
        let pipeline = Arc::new(
            Pipeline::builder(endless(Duration::ZERO))
                .transform::<u64, _>(PassthroughTransform::new().with_delay(Duration::from_millis(1500)))
                .sink(sink.clone())
                .after_hook(hook.clone())
                .build_async(Executor::current().unwrap()),
        );

        let runner = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.run().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let start = Instant::now();
        pipeline.shutdown_now();
        let result = runner.await.unwrap();

        assert!(start.elapsed() < Duration::from_millis(1000));
        assert!(matches!(result, Err(PipelineError::Interrupted(_))));
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert!(pipeline.await_termination(Duration::ZERO).await);
        assert_eq!(sink.calls(), 0);
        assert_eq!(hook.counts(), (0, 0, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_graceful_shutdown_finishes_in_flight_batch() {
        let sink = Arc::new(CollectingSink::<u64>::new("writer"));
        let pipeline = Arc::new(
            Pipeline::builder(endless(Duration::ZERO))
                .transform::<u64, _>(PassthroughTransform::new().with_delay(Duration::from_millis(30)))
                .sink(sink.clone())
                .build_async(Executor::current().unwrap()),
        );

        let runner = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.run().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        pipeline.shutdown();

        assert!(pipeline.await_termination(Duration::from_secs(5)).await);
        let report = runner.await.unwrap().unwrap();

        assert_eq!(report.outcome, RunOutcome::Interrupted);
        assert!(report.batches >= 1);
        assert_eq!(sink.calls() as u64, report.batches);
        assert_eq!(sink.items(), (0..report.batches).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_async_before_hook_failure() {
        let source = three_pairs();
        let pipeline = Pipeline::builder(source.clone())
            .before_hook(FnBeforeHook::new("guard", |_ctx: &RunContext| {
                anyhow::bail!("not today")
            }))
            .build_async(Executor::current().unwrap());

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, PipelineError::Hook { .. }));
        assert_eq!(source.pulls(), 0);
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_retry_waits_between_attempts() {
        let flaky = Arc::new(FlakyTransform::new("enrich", 2));
        let sink = Arc::new(CollectingSink::<i32>::new("writer"));

        let pipeline = Pipeline::builder(VecSource::new("reader", vec![vec![7, 8]]))
            .transform::<i32, _>(
                RetryableTransform::new(flaky.clone())
                    .with_retry(FixedDelay::new(3, Duration::from_millis(50))),
            )
            .sink(sink.clone())
            .build_async(Executor::current().unwrap());

        let start = Instant::now();
        let report = pipeline.run().await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(report.is_completed());
        assert_eq!(flaky.calls(), 3);
        assert_eq!(sink.items(), vec![7, 8]);
        let enrich = pipeline.metrics().get("enrich").unwrap();
        assert_eq!((enrich.success_count, enrich.failure_count), (1, 0));
    }

    #[tokio::test]
    async fn test_async_operator_panic_fails_run() {
        let hook = Arc::new(RecordingHook::default());
        let pipeline = Pipeline::builder(three_pairs())
            .transform(FnTransform::new(
                "explode",
                |_batch: Batch<i32>, _ctx: &RunContext| -> Result<Batch<i32>, OperatorError> {
                    panic!("bad record")
                },
            ))
            .after_hook(hook.clone())
            .build_async(Executor::current().unwrap());

        let err = pipeline.run().await.unwrap_err();

        assert_eq!(err.operator_name(), Some("explode"));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(hook.counts(), (0, 1, 0));
    }

    #[test]
    fn test_async_shutdown_now_with_single_blocking_thread() {
        let hook = Arc::new(RecordingHook::default());
        let pipeline = Arc::new(
            Pipeline::builder(endless(Duration::ZERO))
                .transform::<u64, _>(PassthroughTransform::new().with_delay(Duration::from_millis(1500)))
                .after_hook(hook.clone())
                .build_async(Executor::new(2, 1).unwrap()),
        );
        let handle = pipeline.executor().handle().clone();

        let runner = {
            let pipeline = pipeline.clone();
            handle.spawn(async move { pipeline.run().await })
        };
        std::thread::sleep(Duration::from_millis(200));

        let start = Instant::now();
        pipeline.shutdown_now();
        let result = handle.block_on(runner).unwrap();

        assert!(start.elapsed() < Duration::from_millis(1000));
        assert!(matches!(result, Err(PipelineError::Interrupted(_))));
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(hook.counts(), (0, 0, 1));
    }
}
