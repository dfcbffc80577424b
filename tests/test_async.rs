use xml_cursor::NodeType::{Comment, Element, EndElement, Text, XmlDeclaration};
use xml_cursor::{FeedSource, XmlReader};

use pretty_assertions::assert_eq;
use tokio::io::AsyncWriteExt;

#[tokio::test]
async fn test_sample() {
    let mut input: &[u8] = br#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Sample</title>
    <item><title>First</title><!-- note --></item>
    <item><title>Second</title></item>
  </channel>
</rss>"#;
    let mut r = XmlReader::from_source(FeedSource::new());
    let mut count = 0;
    let mut titles = Vec::new();
    let mut in_title = false;
    while let Some(node) = r.read_async(&mut input).await.unwrap() {
        match node {
            Element => {
                count += 1;
                in_title = r.local_name() == "title";
            }
            Text if in_title => titles.push(r.value_async(&mut input).await.unwrap().to_string()),
            EndElement => in_title = false,
            _ => (),
        }
    }
    assert_eq!(count, 7);
    assert_eq!(titles, ["Sample", "First", "Second"]);
    assert!(r.is_eof());
}

#[tokio::test]
async fn test_xml_decl() {
    let mut input: &[u8] = b"<?xml version=\"1.0\" encoding='utf-8'?><a/>";
    let mut r = XmlReader::from_source(FeedSource::new());
    assert_eq!(r.read_async(&mut input).await.unwrap(), Some(XmlDeclaration));
    assert!(r.move_to_first_attribute().unwrap());
    assert_eq!(r.qualified_name(), "version");
    assert_eq!(r.value_async(&mut input).await.unwrap(), "1.0");
    assert!(r.move_to_next_attribute().unwrap());
    assert_eq!(r.qualified_name(), "encoding");
    assert_eq!(r.value_async(&mut input).await.unwrap(), "utf-8");
    assert!(!r.move_to_next_attribute().unwrap());
}

/// Bytes arrive from another task in small pieces
#[tokio::test(flavor = "multi_thread")]
async fn test_duplex() {
    let (mut tx, mut rx) = tokio::io::duplex(8);
    let writer = tokio::spawn(async move {
        for piece in ["<a><!-- a comment", " split -->", "<b>te", "xt</b></a>"].iter() {
            tx.write_all(piece.as_bytes()).await.unwrap();
        }
    });

    let mut r = XmlReader::from_source(FeedSource::new());
    assert_eq!(r.read_async(&mut rx).await.unwrap(), Some(Element));
    assert_eq!(r.read_async(&mut rx).await.unwrap(), Some(Comment));
    assert_eq!(r.value_async(&mut rx).await.unwrap(), " a comment split ");
    assert_eq!(r.read_async(&mut rx).await.unwrap(), Some(Element));
    assert_eq!(r.read_async(&mut rx).await.unwrap(), Some(Text));
    assert_eq!(r.value_async(&mut rx).await.unwrap(), "text");
    assert_eq!(r.read_async(&mut rx).await.unwrap(), Some(EndElement));
    assert_eq!(r.read_async(&mut rx).await.unwrap(), Some(EndElement));
    assert_eq!(r.read_async(&mut rx).await.unwrap(), None);
    writer.await.unwrap();
}
