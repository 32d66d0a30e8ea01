//! Memory classification integration tests.
//!
//! Kernels are built with `MethodBuilder` and every memory instruction is
//! classified through `MemoryAccessInfo`, the way the VPM lowering pass sees them.

use qpuc::{
    analysis::{is_derived_from_memory, MemoryAccessInfo},
    ir::{
        AddressSpace, DataType, InstrId, MemoryInstruction, MemoryOperation, Method,
        MethodBuilder, Value,
    },
    BackendConfig, Error, Result,
};

fn memory_instructions(method: &Method) -> Vec<InstrId> {
    (0..method.instruction_count())
        .map(InstrId::new)
        .filter(|&id| {
            method
                .instruction(id)
                .is_ok_and(|instruction| instruction.as_memory().is_some())
        })
        .collect()
}

/// out[gid] = lut[gid] + scratch[0]
fn kernel() -> Result<Method> {
    let global_int = DataType::INT32.pointer_to(AddressSpace::Global);
    MethodBuilder::new("lookup").build_with(|f| {
        let out = f.parameter("%out", global_int.clone());
        let gid = f.parameter("%gid", DataType::INT32);
        let lut = f.global("@lut", DataType::INT32.array_of(64), AddressSpace::Constant, true);
        let scratch = f.stack_allocation("%scratch", DataType::INT32.array_of(4));
        let entry = f.alias("%entry", DataType::INT32.pointer_to(AddressSpace::Constant), lut);
        let slot = f.alias("%slot", global_int.clone(), out);
        let a = f.local("%a", DataType::INT32);
        let b = f.local("%b", DataType::INT32);
        let sum = f.local("%sum", DataType::INT32);
        f.block(0, |bb| {
            bb.add(entry, lut, gid);
            bb.read(a, entry);
            bb.read(b, scratch);
            bb.add(sum, a, b);
            bb.add(slot, out, gid);
            bb.write(slot, sum);
            bb.ret();
        });
    })
}

#[test]
fn test_parameter_and_offsets_are_memory() -> Result<()> {
    let method = kernel()?;
    let id = |name: &str| {
        method
            .locals()
            .find(|(_, local)| local.name == name)
            .map(|(id, _)| id)
            .unwrap()
    };

    assert!(is_derived_from_memory(&method, id("%out"))?);
    assert!(is_derived_from_memory(&method, id("%slot"))?);
    assert!(is_derived_from_memory(&method, id("%entry"))?);
    assert!(!is_derived_from_memory(&method, id("%sum"))?);
    Ok(())
}

#[test]
fn test_classify_kernel_accesses() -> Result<()> {
    let method = kernel()?;
    let config = BackendConfig::default();
    let accesses = memory_instructions(&method);
    assert_eq!(accesses.len(), 3);

    let lut_read = MemoryAccessInfo::new(&method, accesses[0], &config)?;
    assert_eq!(lut_read.instruction().operation(), MemoryOperation::Read);
    assert!(lut_read.accesses_constant_global()?);
    assert!(lut_read.can_move_source_into_vpm()?);

    let stack_read = MemoryAccessInfo::new(&method, accesses[1], &config)?;
    assert!(stack_read.accesses_stack_allocation()?);
    assert!(stack_read.can_move_source_into_vpm()?);
    assert_eq!(
        stack_read.source_element_type(false)?,
        DataType::INT32.array_of(4)
    );

    let store = MemoryAccessInfo::new(&method, accesses[2], &config)?;
    assert!(!store.accesses_constant_global()?);
    assert!(!store.accesses_local_memory()?);
    // host buffers never move into the VPM
    assert!(!store.can_move_destination_into_vpm()?);
    assert_eq!(store.destination_element_type(true)?, DataType::INT32);
    Ok(())
}

#[test]
fn test_stack_limit_follows_configuration() -> Result<()> {
    let method = kernel()?;
    let accesses = memory_instructions(&method);

    // 16 bytes per frame: 12 frames need 192 bytes
    let roomy = BackendConfig::default();
    let tight = BackendConfig {
        vpm_capacity: 192,
        ..BackendConfig::default()
    };
    assert!(MemoryAccessInfo::new(&method, accesses[1], &roomy)?.can_move_source_into_vpm()?);
    assert!(!MemoryAccessInfo::new(&method, accesses[1], &tight)?.can_move_source_into_vpm()?);
    Ok(())
}

#[test]
fn test_write_with_count_two_fails() {
    let pointer = Value::literal(0, DataType::INT32.pointer_to(AddressSpace::Global));
    let result = MemoryInstruction::new(
        MemoryOperation::Write,
        pointer.clone(),
        Value::int(7),
        Value::int(2),
    );
    assert!(matches!(result, Err(Error::Classification { .. })));

    // the builder reports the same error from build_with
    let built = MethodBuilder::new("bad").build_with(|f| {
        let p = f.parameter("%p", DataType::INT32.pointer_to(AddressSpace::Global));
        f.block(0, |b| b.memory(MemoryOperation::Read, p, p, 2));
    });
    assert!(matches!(built, Err(Error::Classification { .. })));

    // copies accept any count
    assert!(MemoryInstruction::new(MemoryOperation::Copy, pointer.clone(), pointer, Value::int(2)).is_ok());
}

#[test]
fn test_unknown_operation_tag() {
    let result = MemoryInstruction::from_raw(9, Value::int(0), Value::int(0), Value::int(1));
    assert!(matches!(result, Err(Error::UnknownMemoryOperation(9))));
}

#[test]
fn test_rendering() -> Result<()> {
    let method = kernel()?;
    let rendered: Vec<String> = memory_instructions(&method)
        .into_iter()
        .map(|id| {
            method
                .instruction(id)
                .ok()
                .and_then(|instruction| instruction.as_memory())
                .map(ToString::to_string)
                .unwrap_or_default()
        })
        .collect();

    assert!(rendered[0].contains("= load memory at"));
    assert!(rendered[2].starts_with("store "));
    Ok(())
}
