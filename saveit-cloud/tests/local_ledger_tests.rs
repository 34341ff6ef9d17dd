use saveit_cloud::{LocalLedger, RemoteLedger};
use saveit_storage::LedgerStore;
use saveit_types::{AccountId, CommitOutcome, Item, NewItem};
use tokio_test::assert_ok;

fn ledger(dedup: bool) -> LocalLedger {
    LocalLedger::new(LedgerStore::open_in_memory().unwrap(), dedup)
}

fn acct() -> AccountId {
    AccountId::from("acct")
}

fn item(text: &str) -> Item {
    Item::new(NewItem::new(text, "https://example.com", None))
}

#[tokio::test]
async fn commit_then_existence_roundtrip() {
    let ledger = ledger(true);
    let outcome = assert_ok!(ledger.commit_item(&acct(), &item("a"), Some(10)).await);
    let remote_id = outcome.remote_id().unwrap().clone();

    let found = ledger.existing_ids(std::slice::from_ref(&remote_id)).await.unwrap();
    assert_eq!(found, vec![remote_id.clone()]);

    assert!(ledger.delete_item(&remote_id).await.unwrap());
    assert!(ledger.existing_ids(&[remote_id]).await.unwrap().is_empty());
}

#[tokio::test]
async fn dedup_flag_is_honoured() {
    let it = item("same");

    let dedup = ledger(true);
    dedup.commit_item(&acct(), &it, None).await.unwrap();
    let again = dedup.commit_item(&acct(), &it, None).await.unwrap();
    assert!(matches!(again, CommitOutcome::Duplicate { .. }));

    let no_dedup = ledger(false);
    no_dedup.commit_item(&acct(), &it, None).await.unwrap();
    let again = no_dedup.commit_item(&acct(), &it, None).await.unwrap();
    assert!(matches!(again, CommitOutcome::Created { .. }));
    assert_eq!(no_dedup.list_items(&acct()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn usage_reflects_commits() {
    let ledger = ledger(true);
    for i in 0..3 {
        ledger
            .commit_item(&acct(), &item(&format!("i{i}")), Some(10))
            .await
            .unwrap();
    }
    assert_eq!(ledger.get_usage(&acct()).await.unwrap().lifetime_saved_count, 3);
}

#[tokio::test]
async fn concurrent_commits_never_exceed_cap() {
    let ledger = ledger(true);
    ledger.store().set_pro(&acct(), false).unwrap();

    let mut handles = Vec::new();
    for i in 0..25 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .commit_item(&acct(), &item(&format!("c{i}")), Some(10))
                .await
                .unwrap()
        }));
    }

    let mut created = 0;
    for h in handles {
        if matches!(h.await.unwrap(), CommitOutcome::Created { .. }) {
            created += 1;
        }
    }
    assert_eq!(created, 10);
    assert_eq!(ledger.get_usage(&acct()).await.unwrap().lifetime_saved_count, 10);
}
