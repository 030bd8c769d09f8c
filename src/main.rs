use tokio::sync::watch;

use elevator_ring::elevio::poll;
use elevator_ring::init;
use elevator_ring::manager::Node;
use elevator_ring::network::{local_network, transmitter, udp_broadcast, udp_direct, watchdog};
use elevator_ring::network::message::MsgKind;
use elevator_ring::network::transmitter::ReliableTransmitter;
use elevator_ring::print;


#[tokio::main]
async fn main() {
    let args = init::parse_args();

    let config = match init::build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            print::err(format!("Invalid configuration: {}", e));
            std::process::exit(1);
        }
    };
    print::info(format!(
        "Starting node {} of {} ({} floors, base port {})",
        config.node_id, config.num_nodes, config.num_floors, config.broadcast_port
    ));

    let (elevator, floor) = match init::init_driver(&config, args.sport) {
        Ok(driver) => driver,
        Err(e) => {
            print::err(format!("{:#}", e));
            std::process::exit(1);
        }
    };

    /* START ----------- Init av channels ---------------------- */
    let mpscs = local_network::Mpscs::new();
    let txs = mpscs.txs;
    let (outbox, outbox_rxs) = local_network::Outbox::new();
    let local_network::OutboxRxs { bid, assign, served, sync, datagram: datagram_rx } = outbox_rxs;
    let (addr_tx, addr_rx) = watch::channel(udp_broadcast::PeerAddrs::new());
    /* SLUTT ----------- Init av channels ---------------------- */

    /* START ----------- Liveness ---------------------- */
    {
        let config = config.clone();
        let _heartbeat_task = tokio::spawn(async move {
            print::info("Starting heartbeat".to_string());
            if let Err(e) = udp_broadcast::start_heartbeat(config).await {
                print::err(format!("Heartbeat stopped: {:#}", e));
            }
        });
    }
    {
        let config = config.clone();
        let peer_tx = txs.peer_update.clone();
        let _peer_task = tokio::spawn(async move {
            print::info("Starting peer listener".to_string());
            if let Err(e) = udp_broadcast::start_peer_listener(config, peer_tx, addr_tx).await {
                print::err(format!("Peer listener stopped: {:#}", e));
            }
        });
    }
    {
        let config = config.clone();
        let watchdog_tx = txs.watchdog.clone();
        let _watchdog_task = tokio::spawn(async move {
            print::info("Starting successor watchdog".to_string());
            if let Err(e) = watchdog::start_watchdog(config, watchdog_tx).await {
                print::err(format!("Watchdog stopped: {:#}", e));
            }
        });
    }
    /* SLUTT ----------- Liveness ---------------------- */

    /* START ----------- Envelope transport ---------------------- */
    {
        let config = config.clone();
        let incoming_tx = txs.incoming.clone();
        let _receiver_task = tokio::spawn(async move {
            print::info("Starting envelope receiver".to_string());
            if let Err(e) = udp_direct::start_udp_receiver(config, incoming_tx).await {
                print::err(format!("Envelope receiver stopped: {:#}", e));
            }
        });
    }
    {
        let config = config.clone();
        let _sender_task = tokio::spawn(async move {
            print::info("Starting envelope sender".to_string());
            if let Err(e) = udp_direct::start_udp_sender(config, datagram_rx, addr_rx).await {
                print::err(format!("Envelope sender stopped: {:#}", e));
            }
        });
    }
    let transmitter_cmds = [
        (MsgKind::Bid, bid),
        (MsgKind::Assign, assign),
        (MsgKind::Served, served),
        (MsgKind::Sync, sync),
    ];
    for (kind, cmd_rx) in transmitter_cmds {
        let datagram_tx = outbox.datagram_sender();
        let _transmitter_task = tokio::spawn(async move {
            print::info(format!("Starting {:?} transmitter", kind));
            transmitter::run(ReliableTransmitter::new(kind), cmd_rx, datagram_tx).await;
        });
    }
    /* SLUTT ----------- Envelope transport ---------------------- */

    poll::start_polling(elevator.clone(), txs.elevator.clone());

    let mut node = Node::new(config, elevator, outbox);
    node.init(floor);
    print::ok("Node running".to_string());
    node.run(mpscs.rxs).await;
}
