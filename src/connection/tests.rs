use super::*;
use crate::test_utils::{connected, Event, MockTransport, Peer, RecordingDelegate};
use crate::ConfigBuilder;

fn request(delegate: &Arc<RecordingDelegate>, url: &str) -> Request {
    Request::get(url).delegate(delegate)
}

fn reply(stream_id: StreamId, fin: bool) -> Frame {
    Frame::SynReply(SynReply {
        stream_id,
        fin,
        headers: [(":status", "200"), (":version", "HTTP/1.1")]
            .into_iter()
            .collect(),
    })
}

fn flush(conn: &mut Connection<MockTransport>, peer: &mut Peer) -> Vec<Frame> {
    conn.on_writable().unwrap();
    peer.received()
}

#[test]
fn stream_ids_are_odd_and_increasing() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    let ids = (0..4)
        .map(|i| conn.send(&mut request(&delegate, &format!("/{i}"))).unwrap())
        .collect::<Vec<StreamId>>();
    assert_eq!(ids, vec![1, 3, 5, 7]);

    let opened = flush(&mut conn, &mut peer)
        .into_iter()
        .map(|f| match f {
            Frame::SynStream(syn) => syn.stream_id,
            other => panic!("unexpected frame {other}"),
        })
        .collect::<Vec<StreamId>>();
    assert_eq!(opened, ids);
    assert_eq!(conn.stream_count(), 4);
}

#[test]
fn syn_stream_carries_request_headers() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let mut request = Request::post("/submit").header("Content-Type", "text/plain");
    conn.send(&mut request).unwrap();

    match &flush(&mut conn, &mut peer)[..] {
        [Frame::SynStream(syn)] => {
            assert_eq!(syn.headers.get(":method"), Some("POST"));
            assert_eq!(syn.headers.get(":path"), Some("/submit"));
            assert_eq!(syn.headers.get(":host"), Some("example.com"));
            assert_eq!(syn.headers.get(":scheme"), Some("https"));
            assert_eq!(syn.headers.get("content-type"), Some("text/plain"));
            assert!(!syn.fin);
        }
        other => panic!("unexpected frames {other:?}"),
    }
    assert_eq!(request.state(), StreamState::Open);
    assert_eq!(
        peer.transport.wire().connected,
        Some(("example.com".to_string(), 443, true))
    );
}

#[test]
fn reply_then_fin_data_ends_the_stream() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    let mut request = request(&delegate, "/");
    assert_eq!(conn.send(&mut request).unwrap(), 1);

    peer.send(reply(1, false));
    peer.send(Frame::Data(Data::new(1, Bytes::from_static(b"hello"), true)));
    conn.on_readable().unwrap();

    let events = delegate.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], Event::Headers(h) if h.get(":status") == Some("200")));
    assert_eq!(events[1..], [Event::Input(b"hello".to_vec()), Event::End]);
    assert!(!conn.contains_stream(1));
    assert_eq!(request.state(), StreamState::Closed);
}

#[test]
fn close_emits_one_reset_and_refuses_later_writes() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    let mut first = request(&delegate, "/a");
    let mut second = request(&delegate, "/b");
    conn.send(&mut first).unwrap();
    assert_eq!(conn.send(&mut second).unwrap(), 3);
    flush(&mut conn, &mut peer);

    second.close().unwrap();
    assert_eq!(conn.process_commands().unwrap(), 1);
    assert_eq!(second.state(), StreamState::Closed);
    assert_eq!(
        flush(&mut conn, &mut peer),
        vec![Frame::RstStream(RstStream::new(3, RstStatus::Cancel))]
    );

    let err = second.write_text("late").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Usage);
    second.close().unwrap();
    conn.close(3).unwrap();
    assert_eq!(conn.process_commands().unwrap(), 0);
    assert!(flush(&mut conn, &mut peer).is_empty());
    assert_eq!(delegate.events(), vec![Event::End]);
    assert!(conn.contains_stream(1));
}

#[test]
fn stream_stays_until_both_sides_close() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    let mut request = request(&delegate, "/");
    conn.send(&mut request).unwrap();
    request.end().unwrap();
    conn.process_commands().unwrap();

    assert!(conn.contains_stream(1));
    assert_eq!(conn.stream_state(1), Some(StreamState::HalfClosedLocal));
    let frames = flush(&mut conn, &mut peer);
    assert_eq!(frames[1], Frame::Data(Data::new(1, Bytes::new(), true)));

    peer.send(reply(1, true));
    conn.on_readable().unwrap();
    assert!(!conn.contains_stream(1));
    assert_eq!(delegate.ends(), 1);

    peer.send(Frame::Data(Data::new(1, Bytes::from_static(b"stray"), true)));
    conn.on_readable().unwrap();
    assert!(!conn.contains_stream(1));
    assert_eq!(delegate.ends(), 1);
    assert!(delegate.input().is_empty());
}

#[test]
fn peer_half_close_keeps_stream_writable() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    let mut request = request(&delegate, "/");
    conn.send(&mut request).unwrap();
    flush(&mut conn, &mut peer);

    peer.send(reply(1, true));
    conn.on_readable().unwrap();
    assert_eq!(request.state(), StreamState::HalfClosedRemote);

    request.write_text("body").unwrap();
    request.end().unwrap();
    conn.process_commands().unwrap();
    assert_eq!(
        flush(&mut conn, &mut peer),
        vec![
            Frame::Data(Data::new(1, Bytes::from_static(b"body"), false)),
            Frame::Data(Data::new(1, Bytes::new(), true)),
        ]
    );
    assert!(!conn.contains_stream(1));
    assert_eq!(delegate.ends(), 1);
}

#[test]
fn goaway_refuses_new_streams_but_open_ones_finish() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    let mut open = request(&delegate, "/open");
    conn.send(&mut open).unwrap();

    peer.send(Frame::GoAway(GoAway::new(0, GoAwayStatus::Ok)));
    conn.on_readable().unwrap();
    assert_eq!(conn.state(), ConnectionState::Draining);

    let mut late = Request::get("/late");
    let err = conn.send(&mut late).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Usage);
    assert!(!late.is_sent());

    peer.send(reply(1, false));
    peer.send(Frame::Data(Data::new(1, Bytes::from_static(b"tail"), true)));
    conn.on_readable().unwrap();
    assert_eq!(delegate.input(), b"tail");
    assert_eq!(delegate.ends(), 1);
    assert_eq!(conn.stream_count(), 0);
}

#[test]
fn send_window_holds_data_until_window_update() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    peer.send(Frame::Settings(Settings::new(vec![
        Setting::new(SETTINGS_INITIAL_WINDOW_SIZE, 4),
        Setting::new(SETTINGS_MAX_CONCURRENT_STREAMS, 100),
    ])));
    conn.on_readable().unwrap();
    assert_eq!(conn.settings().initial_window_size, Some(4));
    assert_eq!(conn.settings().max_concurrent_streams, Some(100));

    let mut request = Request::post("/upload");
    conn.send(&mut request).unwrap();
    request.write_text("abcdefgh").unwrap();
    request.end().unwrap();
    conn.process_commands().unwrap();
    let frames = flush(&mut conn, &mut peer);
    assert_eq!(frames.len(), 2);
    assert_eq!(
        frames[1],
        Frame::Data(Data::new(1, Bytes::from_static(b"abcd"), false))
    );

    peer.send(Frame::WindowUpdate(WindowUpdate::new(1, 10)));
    conn.on_readable().unwrap();
    assert_eq!(
        flush(&mut conn, &mut peer),
        vec![
            Frame::Data(Data::new(1, Bytes::from_static(b"efgh"), false)),
            Frame::Data(Data::new(1, Bytes::new(), true)),
        ]
    );
}

fn with_window(size: u32) -> (Connection<MockTransport>, Peer) {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    peer.send(Frame::Settings(Settings::new(vec![Setting::new(
        SETTINGS_INITIAL_WINDOW_SIZE,
        size,
    )])));
    conn.on_readable().unwrap();

    (conn, peer)
}

#[test]
fn end_after_peer_fin_waits_for_window_before_finishing() {
    let (mut conn, mut peer) = with_window(4);
    let delegate = Arc::new(RecordingDelegate::default());
    conn.send(&mut request(&delegate, "/upload")).unwrap();
    peer.send(reply(1, true));
    conn.on_readable().unwrap();
    assert_eq!(conn.stream_state(1), Some(StreamState::HalfClosedRemote));

    conn.write_data(1, Bytes::from_static(b"abcdefgh")).unwrap();
    conn.end(1).unwrap();
    let frames = flush(&mut conn, &mut peer);
    assert_eq!(
        frames[1..],
        [Frame::Data(Data::new(1, Bytes::from_static(b"abcd"), false))]
    );
    assert!(conn.contains_stream(1));
    assert_eq!(delegate.ends(), 0);
    let err = conn.write_data(1, Bytes::from_static(b"late")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Usage);

    peer.send(Frame::WindowUpdate(WindowUpdate::new(1, 10)));
    conn.on_readable().unwrap();
    assert_eq!(
        flush(&mut conn, &mut peer),
        vec![
            Frame::Data(Data::new(1, Bytes::from_static(b"efgh"), false)),
            Frame::Data(Data::new(1, Bytes::new(), true)),
        ]
    );
    assert!(!conn.contains_stream(1));
    assert_eq!(delegate.ends(), 1);
    assert_eq!(delegate.events().last(), Some(&Event::End));
}

#[test]
fn peer_fin_while_our_fin_is_queued_keeps_the_stream() {
    let (mut conn, mut peer) = with_window(4);
    let delegate = Arc::new(RecordingDelegate::default());
    conn.send(&mut request(&delegate, "/upload")).unwrap();
    conn.write_data(1, Bytes::from_static(b"abcdefgh")).unwrap();
    conn.end(1).unwrap();
    assert_eq!(conn.stream_state(1), Some(StreamState::Open));
    assert_eq!(flush(&mut conn, &mut peer).len(), 2);

    peer.send(reply(1, false));
    peer.send(Frame::Data(Data::new(1, Bytes::from_static(b"done"), true)));
    conn.on_readable().unwrap();
    assert!(conn.contains_stream(1));
    assert_eq!(conn.stream_state(1), Some(StreamState::HalfClosedRemote));
    assert_eq!(delegate.ends(), 0);

    peer.send(Frame::WindowUpdate(WindowUpdate::new(1, 4)));
    conn.on_readable().unwrap();
    assert_eq!(
        flush(&mut conn, &mut peer),
        vec![
            Frame::Data(Data::new(1, Bytes::from_static(b"efgh"), false)),
            Frame::Data(Data::new(1, Bytes::new(), true)),
        ]
    );
    assert!(!conn.contains_stream(1));
    assert_eq!(delegate.input(), b"done");
    assert_eq!(delegate.events().last(), Some(&Event::End));
    assert_eq!(delegate.ends(), 1);
}

#[test]
fn oversized_v2_headers_fail_the_send_only() {
    let (mut conn, mut peer) = connected(Version::V2, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    let cookie = "x".repeat(70_000);
    let mut huge = request(&delegate, "/").header("Cookie", &cookie);

    let err = conn.send(&mut huge).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Usage);
    assert!(!huge.is_sent());
    assert!(!conn.has_pending_writes());
    assert_eq!(conn.state(), ConnectionState::Open);

    assert_eq!(conn.send(&mut request(&delegate, "/next")).unwrap(), 1);
    match &flush(&mut conn, &mut peer)[..] {
        [Frame::SynStream(syn)] => assert_eq!(syn.headers.get("url"), Some("/next")),
        other => panic!("unexpected frames {other:?}"),
    }
}

#[test]
fn spdy2_sends_without_window_limits() {
    let (mut conn, mut peer) = connected(Version::V2, ConnectionConfig::default());
    let mut request = Request::post("/upload");
    conn.send(&mut request).unwrap();
    conn.write_data(1, vec![7u8; 100_000]).unwrap();

    let frames = flush(&mut conn, &mut peer);
    match &frames[..] {
        [Frame::SynStream(syn), Frame::Data(data)] => {
            assert_eq!(syn.headers.get("url"), Some("/upload"));
            assert_eq!(data.payload.len(), 100_000);
        }
        other => panic!("unexpected frames {other:?}"),
    }
}

#[test]
fn data_is_split_at_the_frame_size_limit() {
    let config = ConfigBuilder::new().max_frame_size(1024).build();
    let (mut conn, mut peer) = connected(Version::V3, config);
    conn.send(&mut Request::post("/")).unwrap();
    conn.write_data(1, vec![1u8; 2500]).unwrap();

    let lengths = flush(&mut conn, &mut peer)
        .into_iter()
        .filter_map(|f| match f {
            Frame::Data(data) => Some(data.payload.len()),
            _ => None,
        })
        .collect::<Vec<usize>>();
    assert_eq!(lengths, vec![1024, 1024, 452]);
}

#[test]
fn receive_window_is_replenished() {
    let config = ConfigBuilder::new().initial_window_size(100).build();
    let (mut conn, mut peer) = connected(Version::V3, config);
    conn.send(&mut Request::get("/")).unwrap();

    peer.send(Frame::Data(Data::new(1, vec![0u8; 30], false)));
    peer.send(Frame::Data(Data::new(1, vec![0u8; 30], false)));
    conn.on_readable().unwrap();
    let frames = flush(&mut conn, &mut peer);
    assert_eq!(
        frames[0],
        Frame::Settings(Settings::new(vec![Setting::new(
            SETTINGS_INITIAL_WINDOW_SIZE,
            100
        )]))
    );
    assert_eq!(frames[2], Frame::WindowUpdate(WindowUpdate::new(1, 60)));
    assert_eq!(frames.len(), 3);
}

#[test]
fn peer_pings_are_echoed_and_ours_are_consumed() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    peer.send(Frame::Ping(Ping::new(2)));
    conn.on_readable().unwrap();
    assert_eq!(flush(&mut conn, &mut peer), vec![Frame::Ping(Ping::new(2))]);

    let id = conn.ping().unwrap();
    assert_eq!(id % 2, 1);
    assert_eq!(flush(&mut conn, &mut peer), vec![Frame::Ping(Ping::new(id))]);
    peer.send(Frame::Ping(Ping::new(id)));
    conn.on_readable().unwrap();
    assert!(flush(&mut conn, &mut peer).is_empty());
    assert_eq!(conn.ping().unwrap(), id + 2);
}

#[test]
fn pushed_streams_are_refused_on_spdy3() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let mut push = SynStream::new(2, [(":path", "/style.css")].into_iter().collect());
    push.associated_id = 1;
    push.unidirectional = true;
    peer.send(Frame::SynStream(push));
    conn.on_readable().unwrap();

    assert_eq!(
        flush(&mut conn, &mut peer),
        vec![Frame::RstStream(RstStream::new(2, RstStatus::RefusedStream))]
    );
    assert_eq!(conn.stream_count(), 0);
}

#[test]
fn pushed_streams_are_ignored_on_spdy2() {
    let (mut conn, mut peer) = connected(Version::V2, ConnectionConfig::default());
    peer.send(Frame::SynStream(SynStream::new(2, HeaderBlock::new())));
    conn.on_readable().unwrap();
    assert!(flush(&mut conn, &mut peer).is_empty());
}

#[test]
fn peer_reset_reports_error_then_end() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    let mut request = request(&delegate, "/");
    conn.send(&mut request).unwrap();

    peer.send(Frame::RstStream(RstStream::new(1, RstStatus::RefusedStream)));
    conn.on_readable().unwrap();
    assert_eq!(
        delegate.events(),
        vec![
            Event::Error(Error::reset(1, RstStatus::RefusedStream)),
            Event::End
        ]
    );
    assert!(!conn.contains_stream(1));
    assert!(request.write_text("late").is_err());
    assert_eq!(delegate.ends(), 1);
}

#[test]
fn protocol_violation_sends_goaway_and_fails_every_stream() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let watcher = Arc::new(RecordingDelegate::default());
    conn.delegate(&watcher);
    let delegates = [
        Arc::new(RecordingDelegate::default()),
        Arc::new(RecordingDelegate::default()),
    ];
    for delegate in delegates.iter() {
        conn.send(&mut request(delegate, "/")).unwrap();
    }
    let bogus = FrameHeader::Control {
        version: 3,
        kind: 0x42,
        flags: 0,
        length: 0,
    };
    peer.transport.push_inbound(&bogus.to_bytes());

    let err = conn.on_readable().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Protocol { .. }));
    let frames = peer.received();
    assert_eq!(
        frames.last(),
        Some(&Frame::GoAway(GoAway::new(0, GoAwayStatus::ProtocolError)))
    );
    assert!(peer.transport.is_closed());
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.stream_count(), 0);

    for (delegate, id) in delegates.iter().zip([1, 3]) {
        assert_eq!(
            delegate.events(),
            vec![Event::Error(err.clone().on_stream(id)), Event::End]
        );
    }
    assert_eq!(watcher.errors(), vec![err]);
}

#[test]
fn handle_error_visits_streams_in_id_order() {
    let (mut conn, _peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    for path in ["/a", "/b", "/c"] {
        conn.send(&mut request(&delegate, path)).unwrap();
    }

    conn.handle_error(Error::connection_end());
    conn.handle_error(Error::connection_end());
    let expected = [1, 3, 5]
        .into_iter()
        .flat_map(|id| [Event::Error(Error::connection_end().on_stream(id)), Event::End])
        .collect::<Vec<Event>>();
    assert_eq!(delegate.events(), expected);
}

#[test]
fn end_of_stream_closes_without_goaway() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    conn.send(&mut request(&delegate, "/")).unwrap();
    flush(&mut conn, &mut peer);

    peer.transport.set_eof();
    let err = conn.on_readable().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ConnectionEnd);
    assert!(peer.received().is_empty());
    assert!(peer.transport.is_closed());
    assert_eq!(delegate.ends(), 1);
    assert_eq!(delegate.errors()[0].kind(), &ErrorKind::ConnectionEnd);
}

#[test]
fn read_failure_is_a_transport_error() {
    let (mut conn, peer) = connected(Version::V3, ConnectionConfig::default());
    peer.transport.wire().read_error = Some(io::ErrorKind::ConnectionReset);
    let err = conn.on_readable().unwrap_err();
    assert_eq!(
        err.kind(),
        &ErrorKind::Transport(io::ErrorKind::ConnectionReset)
    );
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(conn.send(&mut Request::get("/")).is_err());
}

#[test]
fn write_failure_is_a_transport_error() {
    let (mut conn, peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    conn.send(&mut request(&delegate, "/")).unwrap();
    peer.transport.wire().write_error = Some(io::ErrorKind::BrokenPipe);

    let err = conn.on_writable().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Transport(io::ErrorKind::BrokenPipe));
    assert!(!conn.has_pending_writes());
    assert_eq!(delegate.ends(), 1);
}

#[test]
fn partial_writes_keep_byte_order() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    for path in ["/a", "/b"] {
        let id = conn.send(&mut Request::post(path)).unwrap();
        conn.write_data(id, Bytes::from(path.repeat(40))).unwrap();
        conn.end(id).unwrap();
    }

    peer.transport.set_write_budget(Some(0));
    conn.on_writable().unwrap();
    assert!(conn.has_pending_writes());
    peer.transport.set_write_budget(Some(11));
    conn.on_writable().unwrap();
    assert!(conn.has_pending_writes());
    assert_eq!(peer.transport.wire().outbound.len(), 11);
    peer.transport.set_write_budget(None);
    conn.on_writable().unwrap();
    assert!(!conn.has_pending_writes());

    let kinds = peer
        .received()
        .iter()
        .map(|f| (f.kind_name(), f.stream_id()))
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            ("SynStream", Some(1)),
            ("Data", Some(1)),
            ("Data", Some(1)),
            ("SynStream", Some(3)),
            ("Data", Some(3)),
            ("Data", Some(3)),
        ]
    );
}

#[test]
fn usage_errors_from_the_connection_reach_the_delegate() {
    let (mut conn, _peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    conn.send(&mut request(&delegate, "/")).unwrap();
    conn.end(1).unwrap();

    let err = conn.write_data(1, Bytes::from_static(b"late")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Usage);
    assert_eq!(delegate.errors(), vec![err]);
    assert_eq!(delegate.ends(), 0);
    assert!(conn.write_data(9, Bytes::from_static(b"nobody")).is_err());
}

#[test]
fn dropped_delegate_is_silently_skipped() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    conn.send(&mut request(&delegate, "/")).unwrap();
    drop(delegate);

    peer.send(reply(1, false));
    peer.send(Frame::Data(Data::new(1, Bytes::from_static(b"lost"), true)));
    conn.on_readable().unwrap();
    assert_eq!(conn.stream_count(), 0);
}

#[test]
fn requests_refuse_to_open_twice_or_before_connect() {
    let mut idle =
        Connection::new(Version::V3, MockTransport::default(), ConnectionConfig::default())
            .unwrap();
    assert!(idle.send(&mut Request::get("/")).is_err());
    assert!(idle.ping().is_err());

    let (mut conn, _peer) = connected(Version::V3, ConnectionConfig::default());
    let mut request = Request::get("/");
    conn.send(&mut request).unwrap();
    let err = conn.send(&mut request).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Usage);
    assert!(conn.connect("example.com", 443, true).is_err());
}

#[test]
fn commands_from_another_thread_are_applied_in_order() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let mut request = Request::post("/");
    conn.send(&mut request).unwrap();
    flush(&mut conn, &mut peer);

    let writer = std::thread::spawn(move || {
        request.write_text("one").unwrap();
        request.write_text("two").unwrap();
        request.end().unwrap();
        request
    });
    let request = writer.join().unwrap();
    assert_eq!(conn.wait_commands(Duration::from_secs(1)).unwrap(), 3);
    assert_eq!(conn.wait_commands(Duration::from_millis(5)).unwrap(), 0);
    assert_eq!(request.state(), StreamState::HalfClosedLocal);
    assert_eq!(
        flush(&mut conn, &mut peer),
        vec![
            Frame::Data(Data::new(1, Bytes::from_static(b"one"), false)),
            Frame::Data(Data::new(1, Bytes::from_static(b"two"), false)),
            Frame::Data(Data::new(1, Bytes::new(), true)),
        ]
    );
}

#[test]
fn shutdown_says_goodbye() {
    let (mut conn, mut peer) = connected(Version::V3, ConnectionConfig::default());
    let delegate = Arc::new(RecordingDelegate::default());
    conn.send(&mut request(&delegate, "/")).unwrap();

    conn.shutdown().unwrap();
    let frames = peer.received();
    assert_eq!(
        frames.last(),
        Some(&Frame::GoAway(GoAway::new(0, GoAwayStatus::Ok)))
    );
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(delegate.ends(), 1);
    assert!(peer.transport.is_closed());
}
