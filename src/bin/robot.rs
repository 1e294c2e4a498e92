//! Robot firmware: BLE central that drives the motors from remote commands.
//!
//! Task layout:
//! - `softdevice_task` - SoftDevice event loop
//! - `liveness_task`   - status LED (fast blink searching, slow blink linked)
//! - main              - `RobotSupervisor` cycle, forever

#![no_std]
#![no_main]

use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Level, Output, OutputDrive};
use embassy_nrf::interrupt::Priority;
use embassy_time::Delay;
use nrf_softdevice::Softdevice;
use {defmt_rtt as _, panic_probe as _};

use botlink::config::LinkConfig;
use botlink::liveness::LivenessIndicator;
use botlink::softdevice::board::Led;
use botlink::softdevice::central::SdCentral;
use botlink::softdevice::{self, EmbassyClock};
use botlink::{RobotSupervisor, StatusCell};

static STATUS: StatusCell = StatusCell::new();

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
    info!("robot: starting");

    // SoftDevice reserves priorities 0, 1 and 4.
    let mut hw = embassy_nrf::config::Config::default();
    hw.gpiote_interrupt_priority = Priority::P2;
    hw.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(hw);

    let led = Led(Output::new(p.P0_13, Level::High, OutputDrive::Standard));

    let sd: &'static Softdevice = Softdevice::enable(&softdevice::sd_config("KevsRobots-bot"));
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(liveness_task(led)));

    let mut central = SdCentral::new(sd);

    #[cfg(not(feature = "sensor"))]
    {
        use botlink::control::Drive;
        use botlink::softdevice::board::Motors;

        let motors = Motors::new(
            Output::new(p.P1_01, Level::Low, OutputDrive::Standard),
            Output::new(p.P1_02, Level::Low, OutputDrive::Standard),
            Output::new(p.P1_03, Level::Low, OutputDrive::Standard),
            Output::new(p.P1_04, Level::Low, OutputDrive::Standard),
        );
        let link = LinkConfig::default();
        let mut drive = Drive::new(motors, link.motion_ms);
        let mut supervisor = RobotSupervisor::new(link, &STATUS, EmbassyClock, Delay);
        supervisor.run(&mut central, &mut drive).await
    }

    #[cfg(feature = "sensor")]
    {
        use botlink::control::ReadingLog;

        let mut log = ReadingLog::new();
        let mut supervisor =
            RobotSupervisor::new(LinkConfig::sensor(), &STATUS, EmbassyClock, Delay);
        supervisor.run(&mut central, &mut log).await
    }
}
