//! Remote firmware: BLE peripheral publishing button presses (or die
//! temperature with the `sensor` feature) to the robot.

#![no_std]
#![no_main]

use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Level, Output, OutputDrive};
use embassy_nrf::interrupt::Priority;
use embassy_time::Delay;
use nrf_softdevice::Softdevice;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use botlink::ble::device_info::DeviceInfo;
use botlink::config::{self, LinkConfig};
use botlink::liveness::LivenessIndicator;
use botlink::softdevice::board::Led;
use botlink::softdevice::peripheral::{SdPeripheral, Server};
use botlink::softdevice::{self, EmbassyClock};
use botlink::{RemoteSupervisor, StatusCell};

static STATUS: StatusCell = StatusCell::new();
static SERVER: StaticCell<Server> = StaticCell::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    softdevice::run(sd).await
}

#[embassy_executor::task]
async fn liveness_task(led: Led<'static>) -> ! {
    LivenessIndicator::new(STATUS.reader(), led, Delay).run().await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("remote: starting");

    let mut hw = embassy_nrf::config::Config::default();
    hw.gpiote_interrupt_priority = Priority::P2;
    hw.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(hw);

    let led = Led(Output::new(p.P0_13, Level::High, OutputDrive::Standard));

    let sd = Softdevice::enable(&softdevice::sd_config(config::PEER_NAME));
    let server: &'static Server = SERVER.init(unwrap!(Server::new(sd)));
    let device = DeviceInfo::new(softdevice::device_id());
    info!("remote: serial {}", device.serial.as_str());
    unwrap!(server.load_device_info(&device));

    let sd: &'static Softdevice = sd;
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(liveness_task(led)));

    let mut peripheral = SdPeripheral::new(sd, server);

    #[cfg(not(feature = "sensor"))]
    {
        use botlink::control::ButtonPanel;
        use botlink::softdevice::board::Buttons;
        use embassy_nrf::gpio::{Input, Pull};

        let buttons = Buttons {
            a: Input::new(p.P0_11, Pull::Up),
            b: Input::new(p.P0_12, Pull::Up),
            x: Input::new(p.P0_24, Pull::Up),
            y: Input::new(p.P0_25, Pull::Up),
        };
        let link = LinkConfig::default();
        let mut panel = ButtonPanel::from_config(buttons, Delay, &link);
        let mut supervisor = RemoteSupervisor::new(link, &STATUS, EmbassyClock, Delay);
        supervisor.run(&mut peripheral, &mut panel).await
    }

    #[cfg(feature = "sensor")]
    {
        use botlink::control::SensorFeed;
        use botlink::softdevice::board::DieTemperature;

        let link = LinkConfig::sensor();
        let mut feed = SensorFeed::from_config(DieTemperature, Delay, &link);
        let mut supervisor = RemoteSupervisor::new(link, &STATUS, EmbassyClock, Delay);
        supervisor.run(&mut peripheral, &mut feed).await
    }
}
