#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod clock;
mod device_id;
mod display;
mod eth;
mod network;
mod settings;
mod tls_buffers;

stm32_tim2_monotonic!(Mono, 1_000_000);

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2, USART3])]
mod app {
    use super::*;
    use airq_core::sensor::{Pmsa003i, Spa06};
    use airq_core::{
        startup_failure, Devices, LogflareRelay, RelayConfig, Screen, Settings, SntpConfig,
        Station, StatusDisplay,
    };
    use defmt::{error, info, warn};
    use embassy_embedded_hal::shared_bus::asynch::i2c::I2cDevice;
    use embassy_futures::join::join3;
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Level, Output, Pull, Speed};
    use embassy_stm32::i2c::{self, I2c};
    use embassy_stm32::mode::Async;
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode};
    use embassy_stm32::rng::{self, Rng};
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::Hertz;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::mutex::Mutex;
    use embassy_time::Delay;
    use static_cell::StaticCell;

    use crate::clock::MonoClock;
    use crate::display::RttDisplay;
    use crate::network::{EthernetLink, StackConnector, UdpNtp};
    use crate::tls_buffers::SessionBuffers;

    type SpiPeripheral = embassy_stm32::Peri<'static, peripherals::SPI2>;
    type PinPB13 = embassy_stm32::Peri<'static, peripherals::PB13>;
    type PinPB15 = embassy_stm32::Peri<'static, peripherals::PB15>;
    type PinPB14 = embassy_stm32::Peri<'static, peripherals::PB14>;
    type PinPC6 = embassy_stm32::Peri<'static, peripherals::PC6>;
    type PinPC3 = embassy_stm32::Peri<'static, peripherals::PC3>;
    type PinPC2 = embassy_stm32::Peri<'static, peripherals::PC2>;
    type ExtiChannel = embassy_stm32::Peri<'static, peripherals::EXTI2>;
    type DmaTx = embassy_stm32::Peri<'static, peripherals::DMA1_CH4>;
    type DmaRx = embassy_stm32::Peri<'static, peripherals::DMA1_CH3>;

    type I2cPeripheral = embassy_stm32::Peri<'static, peripherals::I2C1>;
    type PinPB6 = embassy_stm32::Peri<'static, peripherals::PB6>;
    type PinPB7 = embassy_stm32::Peri<'static, peripherals::PB7>;
    type I2cDmaTx = embassy_stm32::Peri<'static, peripherals::DMA1_CH6>;
    type I2cDmaRx = embassy_stm32::Peri<'static, peripherals::DMA1_CH0>;

    type SensorBus = Mutex<CriticalSectionRawMutex, I2c<'static, Async>>;

    struct NetworkPeripherals {
        spi: SpiPeripheral,
        sck: PinPB13,
        mosi: PinPB15,
        miso: PinPB14,
        cs: PinPC6,
        reset: PinPC3,
        int: PinPC2,
        exti: ExtiChannel,
        dma_tx: DmaTx,
        dma_rx: DmaRx,
    }

    /// STEMMA QT port: PMSA003I and SPA06 share I2C1
    struct SensorPeripherals {
        i2c: I2cPeripheral,
        scl: PinPB6,
        sda: PinPB7,
        dma_tx: I2cDmaTx,
        dma_rx: I2cDmaRx,
    }

    // RNG interrupt binding for hardware random number generator
    embassy_stm32::bind_interrupts!(struct RngIrqs {
        RNG => rng::InterruptHandler<peripherals::RNG>;
    });

    embassy_stm32::bind_interrupts!(struct I2cIrqs {
        I2C1_EV => i2c::EventInterruptHandler<peripherals::I2C1>;
        I2C1_ER => i2c::ErrorInterruptHandler<peripherals::I2C1>;
    });

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        led: Output<'static>,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Air quality node starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        // VCO / DIVQ(7) = 48 MHz (RNG clock)
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        let p = embassy_stm32::init(config);
        info!("PLL configured: SYSCLK=84MHz, PLLQ=48MHz for RNG");

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        Mono::start(84_000_000);
        info!("TIM2 monotonic timer initialized at 1 MHz");
        info!("Device UID: {}", device_id::uid_hex());

        let led = Output::new(p.PC1, Level::High, Speed::Low);

        let net_periph = NetworkPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            int: p.PC2,
            exti: p.EXTI2,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };

        let sensor_periph = SensorPeripherals {
            i2c: p.I2C1,
            scl: p.PB6,
            sda: p.PB7,
            dma_tx: p.DMA1_CH6,
            dma_rx: p.DMA1_CH0,
        };

        heartbeat::spawn().ok();
        station_task::spawn(net_periph, sensor_periph, p.RNG).ok();

        (Shared {}, Local { led })
    }

    /// Heartbeat task
    #[task(priority = 1, local = [led])]
    async fn heartbeat(cx: heartbeat::Context) {
        loop {
            cx.local.led.set_high();
            Mono::delay(100.millis()).await;
            cx.local.led.set_low();
            Mono::delay(4900.millis()).await;
        }
    }

    /// Loads settings, brings up the sensors and network, then runs the
    /// poll/forward loop forever
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1)]
    async fn station_task(
        _cx: station_task::Context,
        net: NetworkPeripherals,
        sensors: SensorPeripherals,
        rng_periph: embassy_stm32::Peri<'static, peripherals::RNG>,
    ) -> ! {
        use embassy_net::{Config, StackResources};

        let mut display = RttDisplay::default();

        static SETTINGS: StaticCell<Settings> = StaticCell::new();
        let mut raw = [0u8; 1024];
        let settings: &'static Settings = match airq_core::load(&mut settings::store(), &mut raw) {
            Ok(s) => SETTINGS.init(s),
            Err(e) => {
                error!("Cannot start: {}", e);
                display.show(&startup_failure(&e));
                park().await
            }
        };

        // Sensors
        let mut i2c_config = i2c::Config::default();
        i2c_config.frequency = Hertz(100_000);
        let i2c = I2c::new(
            sensors.i2c,
            sensors.scl,
            sensors.sda,
            I2cIrqs,
            sensors.dma_tx,
            sensors.dma_rx,
            i2c_config,
        );
        static SENSOR_BUS: StaticCell<SensorBus> = StaticCell::new();
        let bus = SENSOR_BUS.init(Mutex::new(i2c));

        let particulate = Pmsa003i::new(I2cDevice::new(bus));
        let environment = if settings.spa06_enabled {
            let mut spa06 = Spa06::new(I2cDevice::new(bus));
            match spa06.init(&mut Delay).await {
                Ok(()) => Some(spa06),
                Err(e) => {
                    warn!("SPA06 unavailable, continuing without it: {}", e);
                    None
                }
            }
        } else {
            None
        };

        // Network
        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(10_000_000); // 10 MHz for W5500

        let spi = Spi::new(
            net.spi,
            net.sck,
            net.mosi,
            net.miso,
            net.dma_tx,
            net.dma_rx,
            spi_config,
        );

        let eth_periph = eth::EthPeripherals {
            spi,
            cs: Output::new(net.cs, Level::High, Speed::VeryHigh),
            reset: Output::new(net.reset, Level::High, Speed::Low),
            int: ExtiInput::new(net.int, net.exti, Pull::Up),
        };

        let (device, w5500_runner) = match eth::init_w5500(eth_periph, device_id::mac_address()).await {
            Ok(parts) => parts,
            Err(e) => {
                error!("Ethernet unavailable: {}", e);
                display.show(&Screen::error("No network hardware"));
                park().await
            }
        };

        // DHCP + DNS + one TCP or UDP socket at a time
        static RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            Config::dhcpv4(Default::default()),
            RESOURCES.init(StackResources::new()),
            device_id::stack_seed(),
        );
        info!("Network stack initialized with DHCP");

        let Some(buffers) = SessionBuffers::take() else {
            error!("Connection buffers already claimed");
            park().await
        };
        let rng = Rng::new(rng_periph, RngIrqs);
        let relay = LogflareRelay::new(
            StackConnector::new(stack, rng, buffers),
            Delay,
            RelayConfig::default(),
        );

        let mut station = Station::new(
            settings,
            Devices {
                particulate,
                environment,
                telemetry: relay,
                display,
                mono: MonoClock,
                delay: Delay,
                link: EthernetLink::new(stack),
            },
        );

        let app_logic = async {
            station
                .boot(&mut UdpNtp::new(stack), &SntpConfig::default())
                .await;
            station.run().await
        };

        let (never, _, _) = join3(w5500_runner.run(), net_runner.run(), app_logic).await;
        never
    }

    /// Leave the task parked after a fatal startup error
    async fn park() -> ! {
        loop {
            core::future::pending::<()>().await;
        }
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }
}
