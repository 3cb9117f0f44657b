use std::sync::Arc;

use ccoa_llm::any::AnyProvider;
use ccoa_llm::mock::MockProvider;
use ccoa_memory::document::chunk_id;
use ccoa_memory::document::identity::ChunkMetadata;
use ccoa_memory::{GatewayConfig, QdrantOps, VectorStoreGateway};
use testcontainers::ContainerAsync;
use testcontainers::GenericImage;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;

const QDRANT_GRPC_PORT: ContainerPort = ContainerPort::Tcp(6334);

fn qdrant_image() -> GenericImage {
    GenericImage::new("qdrant/qdrant", "v1.16.0")
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening"))
        .with_exposed_port(QDRANT_GRPC_PORT)
}

async fn setup_with_qdrant() -> (VectorStoreGateway, ContainerAsync<GenericImage>) {
    let container = qdrant_image().start().await.unwrap();
    let grpc_port = container.get_host_port_ipv4(6334).await.unwrap();
    let url = format!("http://127.0.0.1:{grpc_port}");

    let ops = QdrantOps::new(&url, None).unwrap();
    let gateway = VectorStoreGateway::new(
        Arc::new(ops),
        AnyProvider::Mock(MockProvider::default()).embed_fn(),
        GatewayConfig::default(),
    );
    (gateway, container)
}

fn chunk(path: &str, index: usize) -> ChunkMetadata {
    ChunkMetadata {
        file_path: path.into(),
        chunk_index: index,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn get_or_create_collection_is_idempotent() {
    let (gw, _container) = setup_with_qdrant().await;
    gw.get_or_create_collection("github_com_a_b").await.unwrap();
    let col = gw.get_or_create_collection("github_com_a_b").await.unwrap();
    assert_eq!(gw.count(&col).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn upsert_and_query_round_trip() {
    let (gw, _container) = setup_with_qdrant().await;
    let col = gw.get_or_create_collection("repo").await.unwrap();

    let texts = vec!["def foo(): pass".to_owned(), "<html></html>".to_owned()];
    let metas = vec![chunk("main.py", 0), chunk("index.html", 0)];
    let ids = vec![chunk_id("main.py", 0), chunk_id("index.html", 0)];
    gw.upsert(&col, &texts, &metas, &ids).await.unwrap();

    let result = gw.query(&col, "what does foo do", 5).await.unwrap();
    assert_eq!(result.documents[0], "def foo(): pass");
    assert_eq!(result.metadatas[0], chunk("main.py", 0));
    assert_eq!(result.ids[0], "main.py_0");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn re_upsert_overwrites_points() {
    let (gw, _container) = setup_with_qdrant().await;
    let col = gw.get_or_create_collection("repo").await.unwrap();

    let texts = vec!["fn a() {}".to_owned()];
    let metas = vec![chunk("a.rs", 0)];
    let ids = vec![chunk_id("a.rs", 0)];
    gw.upsert(&col, &texts, &metas, &ids).await.unwrap();
    gw.upsert(&col, &texts, &metas, &ids).await.unwrap();

    assert_eq!(gw.count(&col).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn query_empty_collection_returns_nothing() {
    let (gw, _container) = setup_with_qdrant().await;
    let col = gw.get_or_create_collection("empty").await.unwrap();
    assert!(gw.query(&col, "anything", 5).await.unwrap().is_empty());
}
