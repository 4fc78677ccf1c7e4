//! Event Pipeline Integration Tests
//!
//! Drives NDJSON events through the codec, the router and the channel
//! sink, then checks the lines produced by the status writer.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use item_group_proxy::{
    ChannelSink, CollectingSink, EventKind, GroupId, ItemGroupRouter, JsonLinesCodec,
    RouterOptions, RouterStats, StreamHandle, run_event_loop, run_writer,
};
use serde_json::Value;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

const EVENTS: &str = r#"
# two items on svcA, one pending routing
{"type":"item_request","service":"svcA","handle":1,"token":11,"item":"IBM.N","model":6}
{"type":"item_request","service":"svcA","handle":2,"token":12,"item":"MSFT.O","model":6}
{"type":"item_request","service":"","handle":3,"token":13,"item":"VOD.L"}
{"type":"item_response","handle":1,"group":[0,1]}
{"type":"item_response","handle":2,"group":[0,2]}
{"type":"group_merge","service":"svcA","from":[0,1],"to":[0,2]}
{"type":"group_status","service":"svcA","group":[0,2],"status":{"stream_state":"open","data_state":"suspect","code":0,"text":"stale"}}
{"type":"group_status","service":"svcA","group":[0,2],"status":{"stream_state":"closed","code":0,"text":"source down"}}
"#;

async fn run_pipeline(input: &str, options: RouterOptions) -> (Vec<Value>, RouterStats) {
    let codec = JsonLinesCodec::new();
    let (sink, rx) = ChannelSink::channel(64);
    let mut router = ItemGroupRouter::new(sink, options);

    for line in input.lines() {
        if let Some(event) = codec.decode(line).unwrap() {
            router.handle(event);
        }
    }

    // The writer finishes once the router, and with it the sender, is gone.
    let stats = router.stats();
    drop(router);

    let mut output = Vec::new();
    let written = run_writer(rx, &mut output).await.unwrap();
    assert_eq!(written, stats.statuses_forwarded);

    let lines = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    (lines, stats)
}

#[tokio::test]
async fn group_statuses_reach_every_merged_stream() {
    let (lines, stats) = run_pipeline(EVENTS, RouterOptions::default()).await;

    assert_eq!(lines.len(), 4);
    assert_eq!(stats.pending_requests, 1);
    assert_eq!(stats.index.subscription_count, 0);

    let tokens: Vec<_> = lines.iter().map(|l| l["token"].as_u64().unwrap()).collect();
    assert_eq!(tokens, vec![11, 12, 11, 12]);

    assert_eq!(lines[0]["status"]["data_state"], "suspect");
    assert_eq!(lines[0]["item"], "IBM.N");
    assert_eq!(lines[3]["status"]["stream_state"], "closed");
    assert_eq!(lines[3]["service"], "svcA");
}

#[test]
fn pending_requests_are_never_grouped() {
    let input = r#"
{"type":"item_request","service":"","handle":3,"token":13,"item":"VOD.L"}
{"type":"item_response","handle":3,"group":[0,1]}
{"type":"group_status","service":"svcA","group":[0,1],"status":{"stream_state":"closed"}}
"#;
    let codec = JsonLinesCodec::new();
    let mut router = ItemGroupRouter::new(CollectingSink::new(), RouterOptions::default());

    let outcomes: Vec<_> = input
        .lines()
        .filter_map(|line| codec.decode(line).unwrap())
        .map(|event| router.handle(event))
        .collect();

    assert!(outcomes[0].pending);
    assert!(!outcomes[1].changed);
    assert_eq!(outcomes[2].kind, EventKind::GroupStatus);
    assert_eq!(outcomes[2].forwarded, 0);
    assert!(router.sink().statuses().is_empty());
    assert_eq!(router.stats().pending_requests, 1);
}

#[test]
fn merge_with_purge_drops_the_source_group() {
    let input = r#"
{"type":"item_request","service":"svcA","handle":1,"token":11,"item":"IBM.N"}
{"type":"item_response","handle":1,"group":[5]}
{"type":"group_merge","service":"svcA","from":[5],"to":[6]}
"#;
    let codec = JsonLinesCodec::new();
    let mut router = ItemGroupRouter::new(
        CollectingSink::new(),
        RouterOptions {
            purge_empty_groups: true,
        },
    );
    for line in input.lines() {
        if let Some(event) = codec.decode(line).unwrap() {
            router.handle(event);
        }
    }

    let index = router.index();
    assert!(!index.contains_group("svcA", &GroupId::new(vec![5])));
    assert_eq!(
        index.group_members("svcA", &GroupId::new(vec![6])),
        vec![StreamHandle(1)]
    );
}

#[tokio::test]
async fn terminal_item_response_closes_only_that_stream() {
    let input = r#"
{"type":"item_request","service":"svcA","handle":1,"token":11,"item":"IBM.N"}
{"type":"item_request","service":"svcA","handle":2,"token":12,"item":"MSFT.O"}
{"type":"item_response","handle":1,"group":[1]}
{"type":"item_response","handle":2,"group":[1]}
{"type":"item_response","handle":1,"status":{"stream_state":"closed","text":"not entitled"}}
{"type":"service_status","service":"svcA","status":{"stream_state":"open","data_state":"suspect"}}
"#;
    let (lines, _) = run_pipeline(input, RouterOptions::default()).await;

    let tokens: Vec<_> = lines.iter().map(|l| l["token"].as_u64().unwrap()).collect();
    assert_eq!(tokens, vec![11, 12]);
    assert_eq!(lines[0]["status"]["text"], "not entitled");
    assert_eq!(lines[1]["status"]["data_state"], "suspect");
}

#[tokio::test]
async fn group_close_reaches_more_members_than_the_channel_holds() {
    let mut input = String::new();
    for handle in 1..=10 {
        input.push_str(&format!(
            "{{\"type\":\"item_request\",\"service\":\"svcA\",\"handle\":{handle},\"token\":{handle},\"item\":\"ITEM{handle}\"}}\n"
        ));
        input.push_str(&format!(
            "{{\"type\":\"item_response\",\"handle\":{handle},\"group\":[1]}}\n"
        ));
    }
    input.push_str(
        r#"{"type":"group_status","service":"svcA","group":[1],"status":{"stream_state":"closed"}}"#,
    );
    input.push('\n');

    let (sink, rx) = ChannelSink::channel(4);
    let mut router = ItemGroupRouter::new(sink, RouterOptions::default());
    let writer = tokio::spawn(async move {
        let mut output = Vec::new();
        let written = run_writer(rx, &mut output).await.unwrap();
        (written, String::from_utf8(output).unwrap())
    });

    let summary = run_event_loop(
        BufReader::new(input.as_bytes()),
        &mut router,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(summary.events, 21);

    let stats = router.stats();
    assert_eq!(stats.statuses_forwarded, 10);
    assert_eq!(stats.forward_failures, 0);
    assert!(router.index().is_empty());
    drop(router);

    let (written, text) = writer.await.unwrap();
    assert_eq!(written, 10);
    let mut tokens: Vec<_> = text
        .lines()
        .map(|l| {
            let line: Value = serde_json::from_str(l).unwrap();
            assert_eq!(line["status"]["stream_state"], "closed");
            line["token"].as_u64().unwrap()
        })
        .collect();
    tokens.sort_unstable();
    assert_eq!(tokens, (1..=10).collect::<Vec<_>>());
}
