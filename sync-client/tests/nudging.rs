//! Local edits nudge the syncer.

use std::sync::Arc;
use std::time::Duration;
use treesync_client::{
    BaseNode, Directory, MockCollaborators, NudgeSource, ReadNode, SyncConfig, SyncManager,
    WriteNode, WriteTransaction,
};
use treesync_types::{MetaHandle, WriterTag};

fn ready(config: SyncConfig) -> (SyncManager, MockCollaborators, Arc<Directory>) {
    let mocks = MockCollaborators::new();
    let manager = SyncManager::new(config, mocks.collaborators());
    manager.init(None).unwrap();
    manager.setup_for_test_mode("tester").unwrap();
    let share = manager.user_share().unwrap();
    (manager, mocks, share)
}

/// Create a node as the syncer would, already committed.
fn synced_node(share: &Directory, title: &str) -> MetaHandle {
    let trans = WriteTransaction::new(share, WriterTag::Syncer);
    let root = ReadNode::init_by_root_lookup(&trans);
    let node = WriteNode::init_by_creation(&trans, &root, None).unwrap();
    node.set_title(title);
    trans.mutate(node.get_id(), |e| e.is_unsynced = false);
    node.get_id()
}

#[test]
fn local_creation_nudges_once_per_transaction() {
    let (_manager, mocks, share) = ready(SyncConfig::default());

    {
        let trans = WriteTransaction::new(&share, WriterTag::SyncApi);
        let root = ReadNode::init_by_root_lookup(&trans);
        let a = WriteNode::init_by_creation(&trans, &root, None).unwrap();
        a.set_title("a");
        let b = WriteNode::init_by_creation(&trans, &root, Some(&a)).unwrap();
        b.set_url("https://example.com/");
    }

    assert_eq!(
        mocks.syncer.nudges(),
        vec![(Duration::from_millis(200), NudgeSource::Local)]
    );
}

#[test]
fn nudge_delay_comes_from_config() {
    let mut config = SyncConfig::default();
    config.syncer.nudge_delay_ms = 5;
    let (_manager, mocks, share) = ready(config);

    {
        let trans = WriteTransaction::new(&share, WriterTag::SyncApi);
        let root = ReadNode::init_by_root_lookup(&trans);
        WriteNode::init_by_creation(&trans, &root, None).unwrap();
    }

    assert_eq!(mocks.syncer.nudges()[0].0, Duration::from_millis(5));
}

#[test]
fn syncer_writes_do_not_nudge() {
    let (_manager, mocks, share) = ready(SyncConfig::default());
    synced_node(&share, "from server");
    assert_eq!(mocks.syncer.nudge_count(), 0);
}

#[test]
fn deleting_an_existing_node_nudges() {
    let (_manager, mocks, share) = ready(SyncConfig::default());
    let a = synced_node(&share, "doomed");

    {
        let trans = WriteTransaction::new(&share, WriterTag::SyncApi);
        WriteNode::init_by_id_lookup(&trans, a).unwrap().remove();
    }

    assert_eq!(mocks.syncer.nudge_count(), 1);
}

#[test]
fn created_and_deleted_in_one_transaction_does_not_nudge() {
    let (_manager, mocks, share) = ready(SyncConfig::default());

    {
        let trans = WriteTransaction::new(&share, WriterTag::SyncApi);
        let root = ReadNode::init_by_root_lookup(&trans);
        let node = WriteNode::init_by_creation(&trans, &root, None).unwrap();
        node.remove();
    }

    assert_eq!(mocks.syncer.nudge_count(), 0);
}

#[test]
fn local_only_or_redundant_edits_do_not_nudge() {
    let (_manager, mocks, share) = ready(SyncConfig::default());
    let a = synced_node(&share, "stable");

    {
        let trans = WriteTransaction::new(&share, WriterTag::SyncApi);
        let node = WriteNode::init_by_id_lookup(&trans, a).unwrap();
        node.set_title("stable");
        node.set_external_id(7);
        let root = ReadNode::init_by_root_lookup(&trans);
        node.set_position(&root, None).unwrap();
    }

    assert_eq!(mocks.syncer.nudge_count(), 0);
}

#[test]
fn moving_a_synced_node_nudges() {
    let (_manager, mocks, share) = ready(SyncConfig::default());
    let a = synced_node(&share, "a");
    let folder = synced_node(&share, "folder");

    {
        let trans = WriteTransaction::new(&share, WriterTag::SyncApi);
        let folder = ReadNode::init_by_id_lookup(&trans, folder).unwrap();
        let node = WriteNode::init_by_id_lookup(&trans, a).unwrap();
        node.set_position(&folder, None).unwrap();
        assert_eq!(node.get_parent_id(), Some(folder.get_id()));
    }

    assert_eq!(mocks.syncer.nudge_count(), 1);
}

#[test]
fn no_nudge_after_shutdown_unhooks_the_directory() {
    let (manager, mocks, share) = ready(SyncConfig::default());
    manager.shutdown();

    {
        let trans = WriteTransaction::new(&share, WriterTag::SyncApi);
        let root = ReadNode::init_by_root_lookup(&trans);
        WriteNode::init_by_creation(&trans, &root, None).unwrap();
    }

    assert_eq!(mocks.syncer.nudge_count(), 0);
}
