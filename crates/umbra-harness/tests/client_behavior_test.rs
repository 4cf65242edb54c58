//! End-to-end client behavior against a simulated relay.
//!
//! Each test drives the sans-IO client with encrypted relay frames and a
//! virtual clock, then checks the lines the relay decrypted and the buffers
//! the user would see.

use std::time::Duration;

use umbra_client::{ClientAction, ClientConfig, ClientEvent, ConnectRequest, Phase};
use umbra_core::{MessageKind, STATUS_BUFFER};
use umbra_crypto::DECRYPTION_FAILED_PLACEHOLDER;
use umbra_harness::SimClient;

const SECOND: Duration = Duration::from_secs(1);

fn alice() -> SimClient {
    SimClient::new(ClientConfig::new("alice"))
}

fn closes(actions: &[ClientAction]) -> usize {
    actions.iter().filter(|a| matches!(a, ClientAction::Close)).count()
}

fn opens(actions: &[ClientAction]) -> Vec<&str> {
    actions
        .iter()
        .filter_map(|a| match a {
            ClientAction::Open { server } => Some(server.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn handshake_registers_over_encrypted_channel() {
    let mut sim = alice();
    sim.handshake("libera", "#room").unwrap();

    assert_eq!(sim.relay().acks(), 1);
    assert_eq!(sim.sent(), vec!["NICK alice", "USER alice 0 * :alice"]);
    assert_eq!(sim.client().phase(), Phase::Registering);

    sim.server(&[":irc.sim 001 alice :Welcome"]).unwrap();
    assert!(sim.client().is_connected());
    assert!(sim.sent().is_empty());
}

#[test]
fn nickserv_identify_after_welcome() {
    let config =
        ClientConfig { nickserv_password: Some("hunter2".into()), ..ClientConfig::new("alice") };
    let mut sim = SimClient::new(config);
    sim.handshake("libera", "").unwrap();
    sim.sent();

    sim.server(&[":irc.sim 001 alice :Welcome"]).unwrap();
    assert_eq!(sim.sent(), vec!["PRIVMSG NickServ :IDENTIFY hunter2"]);
}

#[test]
fn channel_privmsg_lands_in_channel_buffer() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();

    sim.server(&[":bob!b@host PRIVMSG #room :hi"]).unwrap();

    let buffer = sim.buffer("#room").unwrap();
    let message = buffer.messages().last().unwrap();
    assert_eq!(message.sender(), "bob");
    assert_eq!(message.body(), "hi");
    assert!(!message.is_private());
}

#[test]
fn direct_privmsg_lands_in_sender_buffer() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();

    sim.server(&[":bob!b@host PRIVMSG alice :hi"]).unwrap();

    assert!(sim.buffer("alice").is_none());
    let message = sim.buffer("bob").unwrap().messages().last().unwrap();
    assert_eq!(message.sender(), "bob");
    assert_eq!(message.body(), "hi");
    assert!(message.is_private());
    assert!(sim.client().buffers().unread().contains(&"bob"));
}

#[test]
fn ctcp_action_is_marked() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();

    sim.server(&[":bob!b@host PRIVMSG #room :\u{1}ACTION waves\u{1}"]).unwrap();

    let message = sim.buffer("#room").unwrap().messages().last().unwrap();
    assert_eq!(message.kind(), MessageKind::Action);
    assert_eq!(message.body(), "waves");
}

#[test]
fn exactly_one_join_after_delay_window() {
    let mut sim = alice();
    sim.register("libera", "#room").unwrap();

    sim.advance(10 * SECOND).unwrap();
    assert!(sim.sent().is_empty());

    sim.advance(SECOND).unwrap();
    assert_eq!(sim.sent(), vec!["JOIN #room"]);

    sim.advance(60 * SECOND).unwrap();
    assert!(sim.sent().is_empty());
}

#[test]
fn repeated_welcome_numerics_do_not_rearm_join() {
    let mut sim = alice();
    sim.register("libera", "#room").unwrap();

    sim.advance(5 * SECOND).unwrap();
    sim.server(&[":irc.sim 376 alice :End of MOTD"]).unwrap();
    sim.advance(6 * SECOND).unwrap();
    assert_eq!(sim.sent(), vec!["JOIN #room"]);

    sim.advance(30 * SECOND).unwrap();
    assert!(sim.sent().is_empty());
}

#[test]
fn early_join_is_rejected_locally() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();

    sim.env().advance(3 * SECOND);
    let actions = sim.input("/join #lobby").unwrap();
    assert!(!actions.iter().any(|a| matches!(a, ClientAction::Send(_))));
    assert!(sim.sent().is_empty());
    let notice = sim.current_messages().last().unwrap();
    assert_eq!(notice.kind(), MessageKind::Error);
    assert!(notice.body().contains("please wait 7 more seconds"));

    sim.env().advance(7 * SECOND);
    sim.input("/join lobby").unwrap();
    assert_eq!(sim.sent(), vec!["JOIN #lobby"]);
}

#[test]
fn join_before_registration_is_rejected() {
    let mut sim = alice();
    sim.handshake("libera", "").unwrap();
    sim.sent();

    sim.input("/join #lobby").unwrap();
    assert!(sim.sent().is_empty());
    assert!(sim.current_messages().last().unwrap().body().contains("not connected"));
}

#[test]
fn disconnect_twice_sends_one_quit_and_one_close() {
    let mut sim = alice();
    sim.register("libera", "#room").unwrap();

    let first = sim.handle(ClientEvent::Disconnect { reason: None }).unwrap();
    let second = sim.handle(ClientEvent::Disconnect { reason: None }).unwrap();

    assert_eq!(sim.sent(), vec!["QUIT :leaving"]);
    assert_eq!(closes(&first), 1);
    assert!(second.is_empty());
    assert!(sim.client().is_reconnect_suppressed());
    assert_eq!(sim.client().phase(), Phase::Disconnected);
}

#[test]
fn quit_command_uses_reason() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();

    sim.input("/quit see you").unwrap();
    assert_eq!(sim.sent(), vec!["QUIT :see you"]);
    assert!(!sim.client().is_reconnect_pending());
}

#[test]
fn token_expired_suppresses_reconnect() {
    let mut sim = alice();
    sim.register("libera", "#room").unwrap();

    let frame = sim.relay().error_frame("TOKEN_EXPIRED", "token expired");
    let actions = sim.frame(frame).unwrap();
    assert_eq!(closes(&actions), 1);
    assert!(sim.client().is_reconnect_suppressed());

    sim.handle(ClientEvent::TransportClosed { reason: Some("bye".into()) }).unwrap();
    assert!(!sim.client().is_reconnect_pending());

    let actions = sim.advance(30 * SECOND).unwrap();
    assert!(opens(&actions).is_empty());

    let status = sim.buffer(STATUS_BUFFER).unwrap();
    assert!(status.messages().iter().any(|m| m.body().contains("TOKEN_EXPIRED")));
}

#[test]
fn non_fatal_relay_error_keeps_session() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();

    let frame = sim.relay().error_frame("UPSTREAM_TIMEOUT", "irc server slow");
    let actions = sim.frame(frame).unwrap();
    assert_eq!(closes(&actions), 0);
    assert!(sim.client().is_connected());
    assert!(!sim.client().is_reconnect_suppressed());
}

#[test]
fn unexpected_close_reconnects_with_fresh_buffers() {
    let mut sim = alice();
    sim.register("libera", "#room").unwrap();
    sim.server(&[":bob!b@host PRIVMSG #room :hi"]).unwrap();

    sim.handle(ClientEvent::TransportClosed { reason: None }).unwrap();
    assert!(sim.client().is_reconnect_pending());
    assert_eq!(sim.client().phase(), Phase::Disconnected);

    let actions = sim.advance(4 * SECOND).unwrap();
    assert!(opens(&actions).is_empty());

    let actions = sim.advance(SECOND).unwrap();
    assert_eq!(opens(&actions), vec!["libera"]);
    assert!(sim.buffer("#room").is_none());
    assert_eq!(sim.client().buffers().buffers().len(), 1);

    sim.open().unwrap();
    assert_eq!(sim.sent(), vec!["NICK alice", "USER alice 0 * :alice"]);
}

#[test]
fn explicit_connect_clears_suppression() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();
    sim.handle(ClientEvent::Disconnect { reason: None }).unwrap();
    assert!(sim.client().is_reconnect_suppressed());

    sim.handshake("libera", "").unwrap();
    assert!(!sim.client().is_reconnect_suppressed());

    sim.handle(ClientEvent::TransportErrored { message: "reset".into() }).unwrap();
    assert!(sim.client().is_reconnect_pending());
}

#[test]
fn registration_timeout_closes_and_retries() {
    let mut sim = alice();
    sim.handshake("libera", "#room").unwrap();

    assert!(sim.advance(29 * SECOND).unwrap().is_empty());

    let actions = sim.advance(SECOND).unwrap();
    assert_eq!(closes(&actions), 1);
    assert!(sim.client().is_reconnect_pending());
    let status = sim.buffer(STATUS_BUFFER).unwrap();
    assert!(status.messages().iter().any(|m| m.body().contains("registration timed out")));
}

#[test]
fn registration_guard_covers_missing_key_material() {
    let mut sim = alice();
    sim.handle(ClientEvent::Connect(ConnectRequest::new("libera", "#room"))).unwrap();
    sim.handle(ClientEvent::TransportOpened).unwrap();
    assert_eq!(sim.client().phase(), Phase::Handshaking);

    assert!(sim.advance(29 * SECOND).unwrap().is_empty());

    let actions = sim.advance(SECOND).unwrap();
    assert_eq!(closes(&actions), 1);
    assert_eq!(sim.client().phase(), Phase::Disconnected);
    assert!(sim.client().is_reconnect_pending());
    assert_eq!(sim.relay().acks(), 0);
}

#[test]
fn reconnect_rejoins_last_joined_channel() {
    let mut sim = alice();
    sim.register("libera", "#room").unwrap();
    sim.advance(11 * SECOND).unwrap();
    sim.server(&[":alice!a@host JOIN #room", ":alice!a@host JOIN #other"]).unwrap();

    sim.handle(ClientEvent::TransportClosed { reason: None }).unwrap();
    sim.advance(5 * SECOND).unwrap();
    sim.open().unwrap();
    sim.server(&[":irc.sim 001 alice :Welcome"]).unwrap();
    sim.sent();

    sim.advance(11 * SECOND).unwrap();
    assert_eq!(sim.sent(), vec!["JOIN #other"]);
}

#[test]
fn parted_channel_is_not_followed_on_reconnect() {
    let mut sim = alice();
    sim.register("libera", "#room").unwrap();
    sim.server(&[":alice!a@host JOIN #other", ":alice!a@host PART #other"]).unwrap();

    sim.handle(ClientEvent::TransportErrored { message: "reset".into() }).unwrap();
    sim.advance(5 * SECOND).unwrap();
    sim.open().unwrap();
    sim.server(&[":irc.sim 001 alice :Welcome"]).unwrap();
    sim.sent();

    sim.advance(11 * SECOND).unwrap();
    assert_eq!(sim.sent(), vec!["JOIN #room"]);
}

#[test]
fn undecryptable_frame_shows_placeholder() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();

    let frame = sim.relay().garbled_frame();
    sim.frame(frame).unwrap();

    let message = sim.current_messages().last().unwrap();
    assert_eq!(message.body(), DECRYPTION_FAILED_PLACEHOLDER);
    assert!(sim.client().is_connected());
}

#[test]
fn plaintext_data_is_dropped() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();
    let before = sim.current_messages().len();

    let frame = sim.relay().plaintext_frame(":bob!b@host PRIVMSG alice :sneaky");
    assert!(sim.frame(frame).unwrap().is_empty());
    assert!(sim.buffer("bob").is_none());
    assert_eq!(sim.current_messages().len(), before);
}

#[test]
fn ping_is_answered_during_registration() {
    let mut sim = alice();
    sim.handshake("libera", "").unwrap();
    sim.sent();

    let actions = sim.server(&["PING :irc.sim"]).unwrap();
    assert_eq!(sim.sent(), vec!["PONG :irc.sim"]);
    assert!(!actions.contains(&ClientAction::Changed));
}

#[test]
fn nick_in_use_retries_with_suffix() {
    let mut sim = alice();
    sim.handshake("libera", "").unwrap();
    sim.sent();

    sim.server(&[":irc.sim 433 * alice :Nickname is already in use"]).unwrap();
    assert_eq!(sim.sent(), vec!["NICK alice_"]);
    assert_eq!(sim.client().nickname(), "alice_");

    sim.server(&[":irc.sim 001 alice_ :Welcome"]).unwrap();
    assert!(sim.client().is_connected());
}

#[test]
fn self_join_requests_names_and_selects_buffer() {
    let mut sim = alice();
    sim.register("libera", "#room").unwrap();
    sim.advance(11 * SECOND).unwrap();
    sim.sent();

    sim.server(&[
        ":alice!a@host JOIN #room",
        ":irc.sim 353 alice = #room :alice @bob",
        ":irc.sim 366 alice #room :End of /NAMES list.",
    ])
    .unwrap();

    assert_eq!(sim.sent(), vec!["NAMES #room"]);
    assert_eq!(sim.client().buffers().current_name(), "#room");
    let view = sim.client().view();
    let names: Vec<&str> = view.roster.iter().map(|m| m.as_str()).collect();
    assert_eq!(names, vec!["alice", "@bob"]);
}

#[test]
fn quit_updates_every_roster_but_logs_once() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();
    sim.server(&[
        ":alice!a@host JOIN #one",
        ":irc.sim 353 alice = #one :alice bob",
        ":irc.sim 366 alice #one :End",
        ":alice!a@host JOIN #two",
        ":irc.sim 353 alice = #two :alice +bob",
        ":irc.sim 366 alice #two :End",
    ])
    .unwrap();
    sim.handle(ClientEvent::SelectBuffer("#one".into())).unwrap();

    sim.server(&[":bob!b@host QUIT :gone"]).unwrap();

    let buffers = sim.client().buffers();
    assert!(!buffers.roster("#one").unwrap().contains("bob"));
    assert!(!buffers.roster("#two").unwrap().contains("bob"));
    let has_quit = |name: &str| {
        buffers.get(name).unwrap().messages().iter().any(|m| m.body() == "bob has quit (gone)")
    };
    assert!(has_quit("#one"));
    assert!(!has_quit("#two"));
}

#[test]
fn join_quit_noise_can_be_suppressed() {
    let config = ClientConfig { suppress_join_quit: true, ..ClientConfig::new("alice") };
    let mut sim = SimClient::new(config);
    sim.register("libera", "").unwrap();
    sim.server(&[":alice!a@host JOIN #room", ":irc.sim 366 alice #room :End"]).unwrap();

    sim.server(&[":bob!b@host JOIN #room", ":carol!c@host PART #room :later"]).unwrap();

    let buffers = sim.client().buffers();
    assert!(buffers.roster("#room").unwrap().contains("bob"));
    assert!(buffers.get("#room").unwrap().messages().iter().all(|m| m.kind() != MessageKind::Event));
}

#[test]
fn joins_after_names_keep_roster_sorted() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();
    sim.server(&[
        ":alice!a@host JOIN #room",
        ":irc.sim 353 alice = #room :alice carol",
        ":irc.sim 366 alice #room :End",
    ])
    .unwrap();

    sim.server(&[":bob!b@host JOIN #room"]).unwrap();

    let roster = sim.client().buffers().roster("#room").unwrap();
    let names: Vec<&str> = roster.members().iter().map(|m| m.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob", "carol"]);
}

#[test]
fn part_and_kick_update_roster() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();
    sim.server(&[
        ":alice!a@host JOIN #room",
        ":irc.sim 353 alice = #room :alice @bob carol",
        ":irc.sim 366 alice #room :End",
    ])
    .unwrap();

    sim.server(&[":bob!b@host PART #room", ":op!o@host KICK #room carol :spam"]).unwrap();

    let roster = sim.client().buffers().roster("#room").unwrap();
    assert!(!roster.contains("bob"));
    assert!(!roster.contains("carol"));
    assert!(roster.contains("alice"));

    sim.server(&[":op!o@host KICK #room alice :bye"]).unwrap();
    assert!(sim.client().buffers().roster("#room").is_none());
}

#[test]
fn nick_change_renames_self_and_members() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();
    sim.server(&[
        ":alice!a@host JOIN #room",
        ":irc.sim 353 alice = #room :alice @bob",
        ":irc.sim 366 alice #room :End",
    ])
    .unwrap();

    sim.server(&[":alice!a@host NICK alicia", ":bob!b@host NICK robert"]).unwrap();

    assert_eq!(sim.client().nickname(), "alicia");
    let roster = sim.client().buffers().roster("#room").unwrap();
    let names: Vec<&str> = roster.members().iter().map(|m| m.as_str()).collect();
    assert_eq!(names, vec!["alicia", "@robert"]);
}

#[test]
fn server_notices_go_to_status() {
    let mut sim = alice();
    sim.handshake("libera", "").unwrap();

    sim.server(&[":irc.sim NOTICE * :*** Looking up your hostname"]).unwrap();

    let status = sim.buffer(STATUS_BUFFER).unwrap();
    let notice = status.messages().last().unwrap();
    assert!(notice.is_notice());
    assert_eq!(notice.body(), "*** Looking up your hostname");
}

#[test]
fn say_on_status_has_no_target() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();

    sim.input("hello?").unwrap();
    assert!(sim.sent().is_empty());
    assert_eq!(sim.current_messages().last().unwrap().kind(), MessageKind::Error);
}

#[test]
fn say_and_msg_echo_locally() {
    let mut sim = alice();
    sim.register("libera", "").unwrap();
    sim.server(&[":alice!a@host JOIN #room"]).unwrap();
    sim.sent();

    sim.input("hello all").unwrap();
    sim.input("/msg bob psst").unwrap();
    sim.input("/me waves").unwrap();

    assert_eq!(
        sim.sent(),
        vec!["PRIVMSG #room :hello all", "PRIVMSG bob :psst", "PRIVMSG #room :\u{1}ACTION waves\u{1}"]
    );
    let room = sim.buffer("#room").unwrap();
    assert!(room.messages().iter().any(|m| m.sender() == "alice" && m.body() == "hello all"));
    assert!(sim.buffer("bob").unwrap().messages()[0].is_private());
}

#[test]
fn lines_before_handshake_are_dropped() {
    let mut sim = alice();
    sim.handle(ClientEvent::Connect(umbra_client::ConnectRequest::new("libera", ""))).unwrap();
    sim.handle(ClientEvent::TransportOpened).unwrap();

    sim.input("/raw PRIVMSG bob :early").unwrap();
    assert!(sim.sent().is_empty());
}

#[test]
fn anonymous_nickname_when_unset() {
    let sim = SimClient::new(ClientConfig::new("  "));
    let nick = sim.client().nickname();
    assert!(nick.starts_with("anon"));
    assert_eq!(nick.len(), 8);
    assert!(nick[4..].chars().all(|c| c.is_ascii_digit()));
}
