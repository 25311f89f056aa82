//! Node views over a directory, end to end.

use treesync_client::{
    BaseNode, BaseTransaction, Directory, NodeError, ReadNode, ReadTransaction, WriteNode,
    WriteTransaction,
};
use treesync_types::{MetaHandle, WriterTag};

fn titles(trans: &dyn BaseTransaction, parent: MetaHandle) -> Vec<String> {
    ReadNode::init_by_id_lookup(trans, parent)
        .unwrap()
        .get_child_ids()
        .into_iter()
        .map(|h| ReadNode::init_by_id_lookup(trans, h).unwrap().get_title())
        .collect()
}

#[test]
fn build_reorder_and_prune_a_bookmark_tree() {
    let directory = Directory::new("user@example.com");

    let (bar, other) = {
        let trans = WriteTransaction::new(&directory, WriterTag::SyncApi);
        let root = ReadNode::init_by_root_lookup(&trans);

        let bar = WriteNode::init_by_creation(&trans, &root, None).unwrap();
        bar.set_title("Bookmarks bar");
        bar.set_unique_tag(Some("bookmark_bar"));
        let other = WriteNode::init_by_creation(&trans, &root, Some(&bar)).unwrap();
        other.set_title("Other bookmarks");

        let mut previous: Option<WriteNode<'_, '_>> = None;
        for (title, url) in [
            ("Rust", "https://www.rust-lang.org/"),
            ("Crates", "https://crates.io/"),
            ("Docs", "https://docs.rs/"),
        ] {
            let node = WriteNode::init_by_creation(
                &trans,
                &bar,
                previous.as_ref().map(|p| p as &dyn BaseNode),
            )
            .unwrap();
            node.set_is_folder(false);
            node.set_title(title);
            node.set_url(url);
            previous = Some(node);
        }
        (bar.get_id(), other.get_id())
    };

    {
        let trans = ReadTransaction::new(&directory);
        assert_eq!(titles(&trans, bar), vec!["Rust", "Crates", "Docs"]);

        let tagged = ReadNode::init_by_tag_lookup(&trans, "bookmark_bar").unwrap();
        assert_eq!(tagged.get_id(), bar);
        assert!(ReadNode::init_by_tag_lookup(&trans, "").is_none());

        let root = ReadNode::init_by_root_lookup(&trans);
        assert_eq!(root.get_child_ids(), vec![bar, other]);
        assert_eq!(root.get_parent_id(), None);
    }

    // Move "Docs" to the front, then file "Crates" under other bookmarks.
    {
        let trans = WriteTransaction::new(&directory, WriterTag::SyncApi);
        let bar_node = ReadNode::init_by_id_lookup(&trans, bar).unwrap();
        let children = bar_node.get_child_ids();
        let docs = WriteNode::init_by_id_lookup(&trans, children[2]).unwrap();
        docs.set_position(&bar_node, None).unwrap();

        let other_node = ReadNode::init_by_id_lookup(&trans, other).unwrap();
        let crates = WriteNode::init_by_id_lookup(&trans, children[1]).unwrap();
        crates.set_position(&other_node, None).unwrap();
        assert_eq!(crates.get_parent_id(), Some(other));
        assert_eq!(crates.get_predecessor_id(), None);
        assert_eq!(crates.get_successor_id(), None);
    }

    {
        let trans = ReadTransaction::new(&directory);
        assert_eq!(titles(&trans, bar), vec!["Docs", "Rust"]);
        assert_eq!(titles(&trans, other), vec!["Crates"]);
    }

    // Remove "Rust"; its handle no longer binds.
    let rust = {
        let trans = WriteTransaction::new(&directory, WriterTag::SyncApi);
        let bar_node = ReadNode::init_by_id_lookup(&trans, bar).unwrap();
        let rust = bar_node.get_child_ids()[1];
        WriteNode::init_by_id_lookup(&trans, rust).unwrap().remove();
        rust
    };

    let trans = ReadTransaction::new(&directory);
    assert!(ReadNode::init_by_id_lookup(&trans, rust).is_none());
    assert_eq!(titles(&trans, bar), vec!["Docs"]);
}

#[test]
fn structural_errors_leave_the_tree_untouched() {
    let directory = Directory::new("share");
    let trans = WriteTransaction::new(&directory, WriterTag::SyncApi);
    let root = ReadNode::init_by_root_lookup(&trans);

    let a = WriteNode::init_by_creation(&trans, &root, None).unwrap();
    let b = WriteNode::init_by_creation(&trans, &a, None).unwrap();
    let c = WriteNode::init_by_creation(&trans, &b, None).unwrap();
    let before = trans.kernel().get_by_handle(a.get_id()).unwrap().clone();

    let err = a.set_position(&c, None).unwrap_err();
    assert_eq!(
        err,
        NodeError::WouldCreateCycle {
            node: a.get_id(),
            parent: c.get_id()
        }
    );

    let err = a.set_position(&root, Some(&c)).unwrap_err();
    assert!(matches!(err, NodeError::PredecessorNotChild { .. }));

    let err = WriteNode::init_by_creation(&trans, &root, Some(&b)).err();
    assert!(matches!(err, Some(NodeError::PredecessorNotChild { .. })));

    assert_eq!(trans.kernel().get_by_handle(a.get_id()), Some(&before));
    assert_eq!(root.get_child_ids(), vec![a.get_id()]);
}

#[test]
fn handles_are_never_reused() {
    let directory = Directory::new("share");
    let first = {
        let trans = WriteTransaction::new(&directory, WriterTag::SyncApi);
        let root = ReadNode::init_by_root_lookup(&trans);
        let node = WriteNode::init_by_creation(&trans, &root, None).unwrap();
        node.remove();
        node.get_id()
    };

    let trans = WriteTransaction::new(&directory, WriterTag::SyncApi);
    let root = ReadNode::init_by_root_lookup(&trans);
    let second = WriteNode::init_by_creation(&trans, &root, None).unwrap();
    assert!(second.get_id() > first);
}
