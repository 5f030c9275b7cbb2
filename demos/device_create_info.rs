//! Building extension chains for a Vulkan-style device creation call.
//!
//! This example demonstrates:
//! 1. Declaring record types that start with a `RecordHeader`
//! 2. Appending a root record and its extensions to a `ChainBuilder`
//! 3. Walking the finalized chain the way a driver would
//! 4. Batching several chains in a `ChainCollection`
//! 5. Getting contract violations back as reports with `try_append`
//!
//! Run with `RUST_LOG`-style filtering left to the subscriber; every event the
//! library emits is printed.

use core::ffi::c_void;

use structchain::{ChainBuilder, ChainCollection, ChainRecord, RecordHeader, handle::ExternalHandle};
use tracing_subscriber::{Registry, layer::SubscriberExt};

const TYPE_DEVICE_CREATE_INFO: i32 = 3;
const TYPE_FEATURES_2: i32 = 1000059000;
const TYPE_TIMELINE_SEMAPHORE_FEATURES: i32 = 1000207000;
const TYPE_IMPORT_MEMORY_FD_INFO: i32 = 1000074000;

#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct DeviceCreateInfo {
    header: RecordHeader,
    flags: u32,
    queue_create_info_count: u32,
}

// SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
unsafe impl ChainRecord for DeviceCreateInfo {}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct PhysicalDeviceFeatures2 {
    header: RecordHeader,
    robust_buffer_access: u32,
    geometry_shader: u32,
}

// SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
unsafe impl ChainRecord for PhysicalDeviceFeatures2 {}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct TimelineSemaphoreFeatures {
    header: RecordHeader,
    timeline_semaphore: u32,
}

// SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
unsafe impl ChainRecord for TimelineSemaphoreFeatures {}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct ImportMemoryFdInfo {
    header: RecordHeader,
    handle_type: u32,
    fd: i32,
}

// SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
unsafe impl ChainRecord for ImportMemoryFdInfo {}

/// Stand-in for closing a file descriptor.
struct Fd;

impl structchain::handle::HandleCloser for Fd {
    type Handle = i32;

    fn close(fd: i32) {
        println!("closing fd {fd}");
    }
}

fn device_chain(timeline: bool) -> structchain::Chain<DeviceCreateInfo> {
    let mut builder = ChainBuilder::<DeviceCreateInfo>::new();
    builder.append(DeviceCreateInfo {
        header: RecordHeader::new(TYPE_DEVICE_CREATE_INFO),
        flags: 0,
        queue_create_info_count: 1,
    });
    builder.append(PhysicalDeviceFeatures2 {
        header: RecordHeader::new(TYPE_FEATURES_2),
        robust_buffer_access: 1,
        geometry_shader: 0,
    });
    if timeline {
        builder.append(TimelineSemaphoreFeatures {
            header: RecordHeader::new(TYPE_TIMELINE_SEMAPHORE_FEATURES),
            timeline_semaphore: 1,
        });
    }
    builder.finalize()
}

/// What a driver does with the chain: start at the root and follow `next`.
fn consume(root: *const DeviceCreateInfo) {
    let mut current = root.cast::<RecordHeader>();
    while !current.is_null() {
        // SAFETY: `current` is the root of a live chain or a forward pointer the
        // chain patched to the next record inside the same allocation.
        let header = unsafe { current.read_unaligned() };
        println!("  record with tag {} at {:p}", header.tag, current);
        current = header.next.cast_const().cast::<RecordHeader>();
    }
}

fn main() {
    let subscriber = Registry::default().with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");

    println!("Example 1: one device chain\n");
    let chain = device_chain(true);
    println!("{chain:#?}");
    consume(chain.as_ptr());

    println!("\nExample 2: a batch of chains\n");
    let mut devices = ChainCollection::new();
    devices.insert(device_chain(false));
    devices.insert(device_chain(true));
    for (index, root) in devices.root_copies().iter().enumerate() {
        println!("device {index}:");
        consume(root);
    }

    println!("\nExample 3: an imported memory handle\n");
    let fd = ExternalHandle::<Fd>::acquire(7, true);
    let mut builder = ChainBuilder::<DeviceCreateInfo>::new();
    builder.append(DeviceCreateInfo {
        header: RecordHeader::new(TYPE_DEVICE_CREATE_INFO),
        flags: 0,
        queue_create_info_count: 0,
    });
    let import = builder.append(ImportMemoryFdInfo {
        header: RecordHeader::new(TYPE_IMPORT_MEMORY_FD_INFO),
        handle_type: 0x1,
        fd: fd.get(),
    });
    let chain = builder.finalize();
    println!("imported fd {}", chain.get::<ImportMemoryFdInfo>(import).map_or(-1, |info| info.fd));
    drop(fd);

    println!("\nExample 4: contract violations\n");
    let mut builder = ChainBuilder::<DeviceCreateInfo>::new();
    let wrong_root = TimelineSemaphoreFeatures {
        header: RecordHeader::new(TYPE_TIMELINE_SEMAPHORE_FEATURES),
        timeline_semaphore: 1,
    };
    if let Err(report) = builder.try_append(wrong_root) {
        println!("{report}");
    }

    let mut prelinked = DeviceCreateInfo {
        header: RecordHeader::new(TYPE_DEVICE_CREATE_INFO),
        flags: 0,
        queue_create_info_count: 0,
    };
    prelinked.header.next = core::ptr::from_ref(&wrong_root).cast_mut().cast::<c_void>();
    if let Err(report) = builder.try_append(prelinked) {
        println!("{report}");
    }

    if let Err(report) = builder.try_finalize() {
        println!("{report}");
    }
}
