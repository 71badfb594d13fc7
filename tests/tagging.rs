mod common;

use common::*;
use imagemgr::{Context, ImageAction, ImageError};
use tokio::runtime::Runtime;

const BUSYBOX: &str = "registry.hub.docker.com/library/busybox:1.25";

#[test]
fn tag_round_trip() {
    Runtime::new().unwrap().block_on(async {
        init_logging();
        let store = FakeContentStore::new();
        store.insert(image(BUSYBOX, "busybox", 1_600_000_000, &[700]));
        let events = RecordingEvents::new();
        let manager = manager_with_events(&store, &events).await;
        let ctx = Context::new();
        let id = config_digest("busybox");

        manager.add_tag(&ctx, "busybox:1.25", "x/y:z").await.unwrap();
        let resolved = manager.check_reference(&ctx, "x/y:z").unwrap();
        assert_eq!(resolved.id, id);
        assert_eq!(
            resolved.primary.as_str(),
            "registry.hub.docker.com/x/y:z"
        );
        assert!(store
            .image_names()
            .contains(&"registry.hub.docker.com/x/y:z".to_owned()));

        // The tag is a primary of its own, and outlives the original name
        manager.remove_image(&ctx, "busybox:1.25", false).await.unwrap();
        assert!(manager
            .check_reference(&ctx, "busybox:1.25")
            .unwrap_err()
            .is_not_found());
        assert_eq!(manager.check_reference(&ctx, "x/y:z").unwrap().id, id);
        assert!(manager.get_image(&ctx, "x/y").await.unwrap_err().is_not_found());
        assert_eq!(manager.get_image(&ctx, "x/y:z").await.unwrap().id, id.to_string());
        assert_eq!(store.removed(), vec![BUSYBOX]);
        assert_eq!(
            events.actions(),
            vec![ImageAction::Tag, ImageAction::Delete]
        );
    })
}

#[test]
fn tag_adds_digest_alias() {
    Runtime::new().unwrap().block_on(async {
        init_logging();
        let store = FakeContentStore::new();
        store.insert(image(BUSYBOX, "busybox", 1_600_000_000, &[700]));
        let manager = manager(&store).await;
        let ctx = Context::new();

        manager.add_tag(&ctx, "busybox:1.25", "example.com/mine").await.unwrap();
        let info = manager.get_image(&ctx, "example.com/mine:latest").await.unwrap();
        assert_eq!(
            info.repo_tags,
            vec![BUSYBOX, "example.com/mine:latest"]
        );
        assert!(info
            .repo_digests
            .contains(&format!("example.com/mine@{}", manifest_digest("busybox"))));
    })
}

#[test]
fn tag_target_validation() {
    Runtime::new().unwrap().block_on(async {
        init_logging();
        let store = FakeContentStore::new();
        store.insert(image(BUSYBOX, "busybox", 1_600_000_000, &[700]));
        store.insert(image(
            "registry.hub.docker.com/library/alpine:latest",
            "alpine",
            1_600_000_000,
            &[100],
        ));
        let manager = manager(&store).await;
        let ctx = Context::new();

        // Already the primary reference of another image
        match manager.add_tag(&ctx, "busybox:1.25", "alpine").await {
            Err(ImageError::InvalidParam(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
        // Tags can't carry digests
        let digested = format!("example.com/app@{}", manifest_digest("busybox"));
        assert!(manager
            .add_tag(&ctx, "busybox:1.25", &digested)
            .await
            .unwrap_err()
            .is_invalid_param());
        match manager.add_tag(&ctx, "busybox:1.25", "Bad/Name").await {
            Err(ImageError::InvalidParam(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert!(manager
            .add_tag(&ctx, "nonexistent:1", "example.com/app:1")
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(
            manager.check_reference(&ctx, "alpine").unwrap().id,
            config_digest("alpine")
        );
    })
}
