//! Document content and drawings

use strongbox::{DocumentError, Drawing, DrawingFormat};
use strongbox_core::domain::{ColorAlias, Stroke};

use crate::common::{second_device, server, signed_up};

fn sketch() -> Drawing {
    Drawing {
        strokes: vec![Stroke {
            points_x: vec![10.0, 40.0, 80.0],
            points_y: vec![10.0, 30.0, 20.0],
            points_girth: vec![2.0, 2.5, 3.0],
            color: ColorAlias::Blue,
            alpha: 1.0,
        }],
        ..Drawing::default()
    }
}

#[tokio::test]
async fn test_overwrite_replaces_content() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/log.txt").await.unwrap();

    alice.write_document(doc.id, b"first").await.unwrap();
    alice.write_document(doc.id, b"second").await.unwrap();
    assert_eq!(alice.read_document(doc.id).await.unwrap(), b"second");
    assert_eq!(alice.get_file_by_id(doc.id).await.unwrap().size, Some(6));
}

#[tokio::test]
async fn test_safe_write_over_the_version_read() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/plan.md").await.unwrap();

    let (hash, content) = alice.read_document_with_hash(doc.id).await.unwrap();
    assert_eq!(hash, None);
    assert!(content.is_empty());

    let first = alice.safe_write(doc.id, hash, b"v1").await.unwrap();
    let (hash, content) = alice.read_document_with_hash(doc.id).await.unwrap();
    assert_eq!(hash, Some(first.clone()));
    assert_eq!(content, b"v1");

    let second = alice.safe_write(doc.id, Some(first), b"v2").await.unwrap();
    assert_eq!(alice.read_document(doc.id).await.unwrap(), b"v2");
    assert_eq!(
        alice.get_file_by_id(doc.id).await.unwrap().size,
        Some(2)
    );
    assert_eq!(
        alice.read_document_with_hash(doc.id).await.unwrap().0,
        Some(second)
    );
}

#[tokio::test]
async fn test_safe_write_refuses_stale_version() {
    let server = server();
    let laptop = signed_up(&server, "alice").await;
    let doc = laptop.create_at_path("/plan.md").await.unwrap();
    laptop.write_document(doc.id, b"v1").await.unwrap();
    laptop.sync(None).await.unwrap();
    let phone = second_device(&server, &laptop).await;

    let (stale, _) = laptop.read_document_with_hash(doc.id).await.unwrap();
    phone.write_document(doc.id, b"from phone").await.unwrap();
    phone.sync(None).await.unwrap();
    laptop.sync(None).await.unwrap();

    assert_eq!(
        laptop.safe_write(doc.id, stale, b"from laptop").await,
        Err(DocumentError::ReReadRequired)
    );
    assert_eq!(laptop.read_document(doc.id).await.unwrap(), b"from phone");

    // a local write also invalidates what was read before it
    let (fresh, _) = laptop.read_document_with_hash(doc.id).await.unwrap();
    laptop.write_document(doc.id, b"local").await.unwrap();
    assert_eq!(
        laptop.safe_write(doc.id, fresh, b"late").await,
        Err(DocumentError::ReReadRequired)
    );
}

#[tokio::test]
async fn test_safe_write_requires_a_document() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let folder = alice.create_at_path("/notes/").await.unwrap();
    assert_eq!(
        alice.safe_write(folder.id, None, b"x").await,
        Err(DocumentError::FileNotDocument)
    );
}

#[tokio::test]
async fn test_large_document_reaches_other_device() {
    let server = server();
    let laptop = signed_up(&server, "alice").await;
    let doc = laptop.create_at_path("/big.bin").await.unwrap();

    // enough varied bytes for several chunks
    let content: Vec<u8> = (0u32..300_000)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect();
    laptop.write_document(doc.id, &content).await.unwrap();
    let result = laptop.sync(None).await.unwrap();
    assert!(result.chunks_uploaded > 1);

    let phone = second_device(&server, &laptop).await;
    assert_eq!(phone.read_document(doc.id).await.unwrap(), content);
}

#[tokio::test]
async fn test_folder_is_not_a_document() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let folder = alice.create_at_path("/folder/").await.unwrap();

    assert_eq!(
        alice.read_document(folder.id).await,
        Err(DocumentError::FileNotDocument)
    );
    assert_eq!(
        alice.write_document(folder.id, b"nope").await,
        Err(DocumentError::FileNotDocument)
    );
}

#[tokio::test]
async fn test_deleted_document_is_gone() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/old.md").await.unwrap();
    alice.write_document(doc.id, b"old").await.unwrap();
    alice.delete_file(doc.id).await.unwrap();

    assert_eq!(
        alice.read_document(doc.id).await,
        Err(DocumentError::FileNonexistent)
    );
}

#[tokio::test]
async fn test_new_drawing_is_blank() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/sketch.draw").await.unwrap();
    assert_eq!(alice.read_drawing(doc.id).await.unwrap(), Drawing::default());
}

#[tokio::test]
async fn test_drawing_round_trip_and_svg() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/sketch.draw").await.unwrap();

    alice.write_drawing(doc.id, &sketch()).await.unwrap();
    assert_eq!(alice.read_drawing(doc.id).await.unwrap(), sketch());

    let svg = alice
        .export_drawing(doc.id, DrawingFormat::Svg)
        .await
        .unwrap();
    let svg = String::from_utf8(svg).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.trim_end().ends_with("</svg>"));
}

#[tokio::test]
async fn test_invalid_drawing_rejected() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/bad.draw").await.unwrap();

    let mut drawing = sketch();
    drawing.strokes[0].points_girth.pop();
    assert_eq!(
        alice.write_drawing(doc.id, &drawing).await,
        Err(DocumentError::InvalidDrawing)
    );

    alice.write_document(doc.id, b"not json").await.unwrap();
    assert_eq!(
        alice.read_drawing(doc.id).await,
        Err(DocumentError::InvalidDrawing)
    );
}
