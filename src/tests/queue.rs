use std::time::Duration;

use super::*;

#[test]
fn retire_waits_for_completion() {
    let ctx = manual_context();
    let buffer = buffer(&ctx, "data");

    let mut a = recorded_list(&ctx, QueueType::Main, &buffer);
    let mut b = recorded_list(&ctx, QueueType::Main, &buffer);
    let mut c = recorded_list(&ctx, QueueType::Main, &buffer);
    let id = ctx.submit(QueueType::Main, &mut [&mut a, &mut b, &mut c]).unwrap();
    assert_eq!(id, 1);

    let queue = ctx.queue(QueueType::Main);
    assert_eq!(queue.in_flight_count(), 3);
    assert_eq!(queue.free_count(), 0);

    // Nothing has completed yet.
    assert_eq!(ctx.retire(), 0);
    assert_eq!(queue.in_flight_count(), 3);
    assert_eq!(queue.free_count(), 0);
    assert!(!ctx.poll_command_list(QueueType::Main, id));

    ctx.backend().signal(QueueType::Main, id);
    assert!(ctx.poll_command_list(QueueType::Main, id));
    assert_eq!(ctx.retire(), 3);
    assert_eq!(queue.in_flight_count(), 0);
    assert_eq!(queue.free_count(), 3);
    assert_eq!(queue.command_buffer_count(), 3);
}

#[test]
fn submissions_retire_in_order() {
    let ctx = manual_context();
    let buffer = buffer(&ctx, "data");
    let queue = ctx.queue(QueueType::Main);

    let mut first = recorded_list(&ctx, QueueType::Main, &buffer);
    let first_id = ctx.submit(QueueType::Main, &mut [&mut first]).unwrap();
    let mut second = recorded_list(&ctx, QueueType::Main, &buffer);
    let second_id = ctx.submit(QueueType::Main, &mut [&mut second]).unwrap();
    assert!(first_id < second_id);
    assert_eq!(queue.last_submitted_id(), second_id);

    ctx.backend().signal(QueueType::Main, first_id);
    assert_eq!(ctx.retire(), 1);
    assert!(ctx.poll_command_list(QueueType::Main, first_id));
    assert!(!ctx.poll_command_list(QueueType::Main, second_id));
    assert_eq!(queue.in_flight_count(), 1);

    ctx.backend().signal(QueueType::Main, second_id);
    assert_eq!(ctx.retire(), 1);
    assert_eq!(queue.last_completed_id(), second_id);
}

#[test]
fn retired_buffers_are_reused() {
    let ctx = context();
    let buffer = buffer(&ctx, "data");

    for _ in 0..4 {
        let mut list = recorded_list(&ctx, QueueType::Transfer, &buffer);
        ctx.submit(QueueType::Transfer, &mut [&mut list]).unwrap();
        ctx.retire();
    }

    assert_eq!(ctx.queue(QueueType::Transfer).command_buffer_count(), 1);
    assert_eq!(
        ctx.backend().allocated_command_buffers(QueueType::Transfer),
        1
    );
    assert_eq!(ctx.backend().submissions(QueueType::Transfer).len(), 4);
}

#[test]
fn allocation_failure_retires_and_retries() {
    let ctx = context_with(
        HeadlessConfig {
            auto_complete: true,
            command_buffer_limit: Some(1),
        },
        RenderConfig::default(),
    );
    let buffer = buffer(&ctx, "data");

    let mut first = recorded_list(&ctx, QueueType::Main, &buffer);
    ctx.submit(QueueType::Main, &mut [&mut first]).unwrap();
    assert_eq!(ctx.queue(QueueType::Main).in_flight_count(), 1);

    // The limit is reached but the first buffer has completed, so it gets recycled.
    let mut second = ctx.create_command_list(QueueType::Main, None);
    second.open().unwrap();
    assert_eq!(ctx.queue(QueueType::Main).in_flight_count(), 0);
    assert_eq!(ctx.backend().allocated_command_buffers(QueueType::Main), 1);
}

#[test]
fn allocation_failure_without_completed_work() {
    let ctx = context_with(
        HeadlessConfig {
            auto_complete: false,
            command_buffer_limit: Some(1),
        },
        RenderConfig::default(),
    );
    let buffer = buffer(&ctx, "data");

    let mut first = recorded_list(&ctx, QueueType::Main, &buffer);
    let id = ctx.submit(QueueType::Main, &mut [&mut first]).unwrap();

    let mut second = ctx.create_command_list(QueueType::Main, Some("second"));
    assert!(matches!(
        second.open(),
        Err(QueueError::OutOfCommandBuffers {
            queue: QueueType::Main,
            ..
        })
    ));
    assert_eq!(second.state(), CommandListState::Idle);

    ctx.backend().signal(QueueType::Main, id);
    second.open().unwrap();
    assert_eq!(second.state(), CommandListState::Recording);
}

#[test]
fn failed_submit_returns_buffers() {
    let ctx = manual_context();
    let buffer = buffer(&ctx, "data");
    let queue = ctx.queue(QueueType::Main);

    let mut list = recorded_list(&ctx, QueueType::Main, &buffer);
    ctx.backend().fail_next_submit();
    assert!(matches!(
        ctx.submit(QueueType::Main, &mut [&mut list]),
        Err(QueueError::Submit { .. })
    ));

    assert_eq!(queue.last_submitted_id(), 0);
    assert_eq!(queue.in_flight_count(), 0);
    assert_eq!(queue.free_count(), 1);
    assert!(ctx.backend().submissions(QueueType::Main).is_empty());
}

#[test]
fn cross_queue_waits_are_consumed() {
    let ctx = context();
    let buffer = buffer(&ctx, "data");

    let mut compute = recorded_list(&ctx, QueueType::Compute, &buffer);
    let compute_id = ctx.submit(QueueType::Compute, &mut [&mut compute]).unwrap();
    ctx.queue_wait_for_submission(QueueType::Main, QueueType::Compute, compute_id);

    let mut main = recorded_list(&ctx, QueueType::Main, &buffer);
    ctx.submit(QueueType::Main, &mut [&mut main]).unwrap();
    let mut main = recorded_list(&ctx, QueueType::Main, &buffer);
    ctx.submit(QueueType::Main, &mut [&mut main]).unwrap();

    let submissions = ctx.backend().submissions(QueueType::Main);
    assert_eq!(
        submissions[0].waits,
        vec![QueueWait {
            queue: QueueType::Compute,
            submission_id: compute_id,
        }]
    );
    assert!(submissions[1].waits.is_empty());
    assert!(ctx.backend().submissions(QueueType::Compute)[0]
        .waits
        .is_empty());
}

#[test]
fn failed_submit_keeps_cross_queue_waits() {
    let ctx = context();
    let buffer = buffer(&ctx, "data");

    let mut compute = recorded_list(&ctx, QueueType::Compute, &buffer);
    let compute_id = ctx.submit(QueueType::Compute, &mut [&mut compute]).unwrap();
    ctx.queue_wait_for_submission(QueueType::Main, QueueType::Compute, compute_id);

    let mut main = recorded_list(&ctx, QueueType::Main, &buffer);
    ctx.backend().fail_next_submit();
    assert!(ctx.submit(QueueType::Main, &mut [&mut main]).is_err());

    let mut retry = recorded_list(&ctx, QueueType::Main, &buffer);
    ctx.submit(QueueType::Main, &mut [&mut retry]).unwrap();

    let submissions = ctx.backend().submissions(QueueType::Main);
    assert_eq!(submissions.len(), 1);
    assert_eq!(
        submissions[0].waits,
        vec![QueueWait {
            queue: QueueType::Compute,
            submission_id: compute_id,
        }]
    );
}

#[test]
fn wait_blocks_until_signaled() {
    let ctx = manual_context();
    let buffer = buffer(&ctx, "data");

    let mut list = recorded_list(&ctx, QueueType::Main, &buffer);
    let id = ctx.submit(QueueType::Main, &mut [&mut list]).unwrap();

    assert!(!ctx.wait_command_list(QueueType::Main, id, Some(Duration::from_millis(5))));

    std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            ctx.backend().signal(QueueType::Main, id);
        });
        assert!(ctx.wait_command_list(QueueType::Main, id, None));
    });

    assert!(ctx.poll_command_list(QueueType::Main, id));
}

#[test]
fn submitted_list_returns_to_idle() {
    let ctx = context();
    let buffer = buffer(&ctx, "data");

    let mut closed = recorded_list(&ctx, QueueType::Main, &buffer);
    let id = ctx.submit(QueueType::Main, &mut [&mut closed]).unwrap();
    assert_eq!(closed.state(), CommandListState::Idle);
    assert!(closed.command_buffer().is_none());

    let submissions = ctx.backend().submissions(QueueType::Main);
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].value, id);
    assert_eq!(submissions[0].command_buffers.len(), 1);
}
