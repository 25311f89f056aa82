//! Change delivery from syncer transactions to the observer.

use std::sync::Arc;
use treesync_client::{
    BaseNode, BaseTransaction, Directory, MockCollaborators, ReadNode, ReadTransaction,
    RecordingObserver, SyncConfig, SyncManager, WriteNode, WriteTransaction,
};
use treesync_types::{ChangeAction, ChangeRecord, MetaHandle, WriterTag};

struct Harness {
    manager: SyncManager,
    observer: RecordingObserver,
    share: Arc<Directory>,
}

fn ready_manager() -> Harness {
    let mocks = MockCollaborators::new();
    let manager = SyncManager::new(SyncConfig::default(), mocks.collaborators());
    let observer = RecordingObserver::new();
    manager.set_observer(Arc::new(observer.clone()));
    manager.init(None).unwrap();
    manager.setup_for_test_mode("tester").unwrap();
    let share = manager.user_share().unwrap();
    Harness {
        manager,
        observer,
        share,
    }
}

fn create(
    trans: &WriteTransaction<'_>,
    parent: MetaHandle,
    after: Option<MetaHandle>,
    title: &str,
) -> MetaHandle {
    let parent = ReadNode::init_by_id_lookup(trans, parent).unwrap();
    let predecessor = after.map(|h| ReadNode::init_by_id_lookup(trans, h).unwrap());
    let node = WriteNode::init_by_creation(
        trans,
        &parent,
        predecessor.as_ref().map(|p| p as &dyn BaseNode),
    )
    .unwrap();
    node.set_title(title);
    node.get_id()
}

fn root(share: &Directory) -> MetaHandle {
    ReadTransaction::new(share).kernel().root_handle()
}

#[test]
fn adds_arrive_in_tree_order_once_per_transaction() {
    let h = ready_manager();
    let root = root(&h.share);

    let (a, a1, b) = {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        let a = create(&trans, root, None, "a");
        let b = create(&trans, root, Some(a), "b");
        let a1 = create(&trans, a, None, "a1");
        (a, a1, b)
    };

    assert_eq!(
        h.observer.change_lists(),
        vec![vec![
            ChangeRecord::added(a),
            ChangeRecord::added(a1),
            ChangeRecord::added(b),
        ]]
    );
}

#[test]
fn deletes_come_first_deepest_first() {
    let h = ready_manager();
    let root = root(&h.share);

    let (a, a1, a11, b, c) = {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        let a = create(&trans, root, None, "a");
        let b = create(&trans, root, Some(a), "b");
        let a1 = create(&trans, a, None, "a1");
        let a11 = create(&trans, a1, None, "a11");
        let c = create(&trans, root, Some(b), "c");
        (a, a1, a11, b, c)
    };

    {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        // Removal order deliberately shallow-first.
        for handle in [b, a1, a11] {
            WriteNode::init_by_id_lookup(&trans, handle).unwrap().remove();
        }
        WriteNode::init_by_id_lookup(&trans, c)
            .unwrap()
            .set_title("c renamed");
    }

    let lists = h.observer.change_lists();
    assert_eq!(lists.len(), 2);
    assert_eq!(
        lists[1],
        vec![
            ChangeRecord::deleted(a11),
            ChangeRecord::deleted(a1),
            ChangeRecord::deleted(b),
            ChangeRecord::updated(c, false),
        ]
    );
    assert!(lists[1].iter().all(|record| record.id != a));
}

#[test]
fn moves_report_position_changes() {
    let h = ready_manager();
    let root = root(&h.share);

    let (a, b) = {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        let a = create(&trans, root, None, "a");
        let b = create(&trans, root, Some(a), "b");
        (a, b)
    };

    {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        let root_node = ReadNode::init_by_root_lookup(&trans);
        WriteNode::init_by_id_lookup(&trans, b)
            .unwrap()
            .set_position(&root_node, None)
            .unwrap();
        WriteNode::init_by_id_lookup(&trans, a)
            .unwrap()
            .set_title("a renamed");
    }

    let lists = h.observer.change_lists();
    assert_eq!(
        lists[1],
        vec![ChangeRecord::updated(b, true), ChangeRecord::updated(a, false)]
    );
    assert!(lists[1]
        .iter()
        .all(|record| record.action == ChangeAction::Update));
}

#[test]
fn add_then_delete_in_one_transaction_is_invisible() {
    let h = ready_manager();
    let root = root(&h.share);

    {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        let x = create(&trans, root, None, "ephemeral");
        WriteNode::init_by_id_lookup(&trans, x).unwrap().remove();
    }

    assert!(h.observer.change_lists().is_empty());
}

#[test]
fn redundant_writes_produce_no_records() {
    let h = ready_manager();
    let root = root(&h.share);

    let a = {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        create(&trans, root, None, "a")
    };

    {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        let node = WriteNode::init_by_id_lookup(&trans, a).unwrap();
        node.set_title("a");
        node.set_is_folder(true);
        node.set_position(&ReadNode::init_by_root_lookup(&trans), None)
            .unwrap();
        // Touched, but nothing visible changed.
        node.set_external_id(42);
    }

    assert_eq!(h.observer.change_lists().len(), 1);
}

#[test]
fn local_writes_are_not_delivered() {
    let h = ready_manager();
    let root = root(&h.share);

    {
        let trans = WriteTransaction::new(&h.share, WriterTag::SyncApi);
        create(&trans, root, None, "local");
    }

    assert!(h.observer.change_lists().is_empty());
}

#[test]
fn non_api_entries_are_ignored() {
    let h = ready_manager();
    let root = root(&h.share);

    let a = {
        let trans = WriteTransaction::new(&h.share, WriterTag::Unittest);
        let a = create(&trans, root, None, "internal");
        trans.mutate(a, |e| e.is_api_object = false);
        a
    };
    assert!(h.observer.change_lists().is_empty());

    {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        trans.mutate(a, |e| e.url = "https://example.com/".to_string());
    }
    assert!(h.observer.change_lists().is_empty());
}

#[test]
fn observer_reads_the_applied_state() {
    use std::sync::Mutex;
    use treesync_client::Observer;
    use treesync_types::AuthError;

    #[derive(Default)]
    struct TitleObserver {
        titles: Mutex<Vec<String>>,
    }

    impl Observer for TitleObserver {
        fn on_changes_applied(&self, trans: &ReadTransaction<'_>, changes: &[ChangeRecord]) {
            let mut titles = self.titles.lock().unwrap();
            for change in changes {
                let node = ReadNode::init_by_id_lookup(trans, change.id).unwrap();
                titles.push(node.get_title());
            }
        }
        fn on_initialization_complete(&self) {}
        fn on_auth_error(&self, _error: &AuthError) {}
        fn on_sync_cycle_completed(&self) {}
    }

    let h = ready_manager();
    let observer = Arc::new(TitleObserver::default());
    h.manager.set_observer(observer.clone());
    let root = root(&h.share);

    {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        let a = create(&trans, root, None, "first");
        create(&trans, root, Some(a), "..");
    }

    assert_eq!(
        *observer.titles.lock().unwrap(),
        vec!["first".to_string(), "..".to_string()]
    );
}

#[test]
fn removing_the_observer_drops_pending_changes() {
    let h = ready_manager();
    let root = root(&h.share);
    h.manager.remove_observer();

    {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        create(&trans, root, None, "unseen");
    }

    h.manager.set_observer(Arc::new(h.observer.clone()));
    let b = {
        let trans = WriteTransaction::new(&h.share, WriterTag::Syncer);
        create(&trans, root, None, "seen")
    };

    assert_eq!(h.observer.change_lists(), vec![vec![ChangeRecord::added(b)]]);
}

#[test]
fn concurrent_syncer_transactions_each_deliver_their_own_changes() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 500;

    let h = ready_manager();
    let root = root(&h.share);

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let share = &h.share;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    let trans = WriteTransaction::new(share, WriterTag::Syncer);
                    create(&trans, root, None, &format!("{}-{}", t, i));
                }
            });
        }
    });

    let lists = h.observer.change_lists();
    assert_eq!(lists.len(), THREADS * PER_THREAD);
    assert!(lists.iter().all(|list| list.len() == 1));

    let mut added: Vec<MetaHandle> = lists
        .iter()
        .flatten()
        .filter(|record| record.action == ChangeAction::Add)
        .map(|record| record.id)
        .collect();
    added.sort();
    added.dedup();
    assert_eq!(added.len(), THREADS * PER_THREAD);
}
