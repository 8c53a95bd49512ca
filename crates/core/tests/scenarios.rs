// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end admission scenarios against a simulated fleet

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use throttle_core::{
    Category, Executor, ExecutorSnapshot, Node, NodeInventory, OwnerId, PipelineGate, QueueItem,
    QueueState, RunningWork, SequentialIdGen, SystemClock, TaskId, TaskKind, ThrottleConfig,
    ThrottleService,
};

/// A fleet whose executors the scenarios fill and drain directly
#[derive(Clone, Default)]
struct SimFleet {
    nodes: Arc<Mutex<BTreeMap<String, Vec<Option<TaskId>>>>>,
    pending: Arc<Mutex<HashSet<TaskId>>>,
}

impl SimFleet {
    fn with_nodes(names: &[&str], executors: usize) -> Self {
        let fleet = Self::default();
        {
            let mut nodes = fleet.nodes.lock().unwrap();
            for name in names {
                nodes.insert(name.to_string(), vec![None; executors]);
            }
        }
        fleet
    }

    fn start(&self, task: &TaskId, node: &str) {
        let mut nodes = self.nodes.lock().unwrap();
        let slot = nodes
            .get_mut(node)
            .and_then(|slots| slots.iter_mut().find(|s| s.is_none()))
            .expect("free executor");
        *slot = Some(task.clone());
    }

    fn finish(&self, task: &TaskId) {
        let mut nodes = self.nodes.lock().unwrap();
        for slots in nodes.values_mut() {
            if let Some(slot) = slots.iter_mut().find(|s| s.as_ref() == Some(task)) {
                *slot = None;
                return;
            }
        }
    }

    fn has_free(&self, node: &str) -> bool {
        self.nodes
            .lock()
            .unwrap()
            .get(node)
            .is_some_and(|slots| slots.iter().any(Option::is_none))
    }

    fn running_on(&self, node: &str) -> usize {
        self.nodes
            .lock()
            .unwrap()
            .get(node)
            .map_or(0, |slots| slots.iter().flatten().count())
    }

    fn running_total(&self) -> usize {
        self.nodes
            .lock()
            .unwrap()
            .values()
            .map(|slots| slots.iter().flatten().count())
            .sum()
    }
}

impl NodeInventory for SimFleet {
    fn all_nodes(&self) -> Vec<Node> {
        self.nodes.lock().unwrap().keys().map(Node::new).collect()
    }

    fn builtin_node(&self) -> Option<Node> {
        None
    }
}

impl ExecutorSnapshot for SimFleet {
    fn executors_on(&self, node: &str) -> Vec<Executor> {
        let started_at = Instant::now();
        self.nodes
            .lock()
            .unwrap()
            .get(node)
            .map(|slots| {
                slots
                    .iter()
                    .map(|slot| Executor {
                        current: slot.clone().map(|task| RunningWork {
                            task,
                            started_at,
                            params: BTreeMap::new(),
                        }),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl QueueState for SimFleet {
    fn is_pending(&self, task: &TaskId) -> bool {
        self.pending.lock().unwrap().contains(task)
    }
}

type Service = ThrottleService<SimFleet, SystemClock, SequentialIdGen>;

fn service(categories: Vec<Category>, tasks: usize) -> (Service, Vec<TaskId>) {
    let fleet = SimFleet::with_nodes(&["n1", "n2"], 10);
    let svc = ThrottleService::with_parts(
        fleet,
        SystemClock,
        Arc::new(PipelineGate::with_ids(SequentialIdGen::new("scope"))),
    );
    svc.upsert_categories(categories);
    let ids: Vec<TaskId> = (0..tasks).map(|i| TaskId::new(format!("task-{i}"))).collect();
    for id in &ids {
        svc.register_task(id.clone(), TaskKind::Plain, ThrottleConfig::categories(&["cat"]));
    }
    (svc, ids)
}

/// One scheduling pass: place every queued task on the first node that
/// admits it. Returns the tasks left in the queue.
fn schedule(svc: &Service, queue: Vec<TaskId>) -> Vec<TaskId> {
    let mut left = Vec::new();
    for task in queue {
        let item = QueueItem::new(task.clone());
        let node = ["n1", "n2"]
            .into_iter()
            .find(|node| svc.fleet().has_free(node) && svc.can_take_on(node, &item).is_allowed());
        match node {
            Some(node) => svc.fleet().start(&task, node),
            None => left.push(task),
        }
    }
    left
}

#[test]
fn scenario_a_per_node_limit_caps_each_node() {
    let (svc, tasks) = service(vec![Category::new("cat").with_max_per_node(3)], 11);

    let queued = schedule(&svc, tasks.clone());

    assert_eq!(svc.fleet().running_on("n1"), 3);
    assert_eq!(svc.fleet().running_on("n2"), 3);
    assert_eq!(svc.fleet().running_total(), 6);
    assert_eq!(queued.len(), 5);

    // Nothing more fits until something finishes
    let queued = schedule(&svc, queued);
    assert_eq!(queued.len(), 5);

    for task in &tasks {
        svc.fleet().finish(task);
    }
    let queued = schedule(&svc, queued);
    assert!(queued.is_empty());
    assert_eq!(svc.fleet().running_total(), 5);
}

#[test]
fn scenario_b_total_limit_caps_the_fleet() {
    let (svc, tasks) = service(vec![Category::new("cat").with_max_total(4)], 7);

    let queued = schedule(&svc, tasks);

    assert_eq!(svc.fleet().running_total(), 4);
    assert_eq!(queued.len(), 3);
    assert!(!svc.can_run(&QueueItem::new(queued[0].clone())).is_allowed());
}

#[test]
fn scenario_c_nested_scopes_take_turns_on_a_node() {
    let (svc, _) = service(
        vec![
            Category::new("pipeline"),
            Category::new("one_per_node").with_max_per_node(1),
        ],
        0,
    );
    let owner = OwnerId::new("pipeline-run-1");
    let outer = svc.enter_scope(&owner, None, &["pipeline"]).unwrap();
    let first = svc.enter_scope(&owner, Some(&outer), &["one_per_node"]).unwrap();
    let second = svc.enter_scope(&owner, Some(&outer), &["one_per_node"]).unwrap();
    let n1 = Node::new("n1");

    assert!(svc.can_take_scope(&first, &n1).unwrap().is_allowed());
    svc.bind_node(&first, "n1").unwrap();

    assert!(!svc.can_take_scope(&second, &n1).unwrap().is_allowed());

    svc.release_node(&first, "n1");
    svc.finish_scope(&first);

    assert!(svc.can_take_scope(&second, &n1).unwrap().is_allowed());
    svc.bind_node(&second, "n1").unwrap();
    assert_eq!(svc.gate().node_usage("one_per_node", "n1"), 1);
}

#[test]
fn concurrent_schedulers_never_exceed_limits() {
    let (svc, tasks) = service(
        vec![Category::new("cat").with_max_per_node(2).with_max_total(3)],
        12,
    );
    let svc = Arc::new(svc);
    // The host serializes a check with the start it leads to
    let queue_lock = Arc::new(Mutex::new(()));
    let peaks: Arc<Mutex<HashMap<&'static str, usize>>> = Arc::default();

    let handles: Vec<_> = tasks
        .into_iter()
        .map(|task| {
            let svc = Arc::clone(&svc);
            let queue_lock = Arc::clone(&queue_lock);
            let peaks = Arc::clone(&peaks);
            thread::spawn(move || {
                let item = QueueItem::new(task.clone());
                loop {
                    {
                        let _guard = queue_lock.lock().unwrap();
                        let node = ["n1", "n2"].into_iter().find(|node| {
                            svc.fleet().has_free(node) && svc.can_take_on(node, &item).is_allowed()
                        });
                        if let Some(node) = node {
                            svc.fleet().start(&task, node);
                            let mut peaks = peaks.lock().unwrap();
                            for name in ["n1", "n2"] {
                                let entry = peaks.entry(name).or_default();
                                *entry = (*entry).max(svc.fleet().running_on(name));
                            }
                            let total = peaks.entry("total").or_default();
                            *total = (*total).max(svc.fleet().running_total());
                            break;
                        }
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                thread::sleep(Duration::from_millis(5));
                svc.fleet().finish(&task);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let peaks = peaks.lock().unwrap();
    assert!(peaks["n1"] <= 2);
    assert!(peaks["n2"] <= 2);
    assert!(peaks["total"] <= 3);
    assert_eq!(svc.fleet().running_total(), 0);
}

proptest! {
    #[test]
    fn limits_hold_under_any_start_finish_order(
        per_node in 0u32..4,
        total in 0u32..6,
        tasks in 1usize..14,
        steps in proptest::collection::vec(any::<bool>(), 1..60),
    ) {
        let (svc, ids) = service(
            vec![Category::new("cat")
                .with_max_per_node(i64::from(per_node))
                .with_max_total(i64::from(total))],
            tasks,
        );
        let mut queue = ids;
        let mut running: Vec<TaskId> = Vec::new();

        for admit in steps {
            if admit || running.is_empty() {
                let before: HashSet<TaskId> = queue.iter().cloned().collect();
                queue = schedule(&svc, queue);
                let after: HashSet<TaskId> = queue.iter().cloned().collect();
                running.extend(before.difference(&after).cloned());
                if per_node == 0 && total == 0 {
                    prop_assert!(queue.is_empty());
                }
            } else {
                let task = running.remove(0);
                svc.fleet().finish(&task);
                queue.push(task);
            }

            if per_node > 0 {
                prop_assert!(svc.fleet().running_on("n1") <= per_node as usize);
                prop_assert!(svc.fleet().running_on("n2") <= per_node as usize);
            }
            if total > 0 {
                prop_assert!(svc.fleet().running_total() <= total as usize);
            }
        }
    }
}
