//! Property-based tests for the instruction cycle.
//!
//! Uses proptest to check arithmetic and memory invariants across random
//! register and memory contents.

#[cfg(test)]
mod tests {
    use crate::*;
    use crate::cpu::MEMORY_SIZE;
    use proptest::prelude::*;

    fn program(lines: &[String]) -> Vec<Word> {
        lines.iter().map(|line| Word::parse(line)).collect()
    }

    fn run(lines: &[String], ac: u16) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load(&program(lines)).unwrap();
        cpu.set_accumulator(ac);
        cpu.run().unwrap();
        cpu
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    proptest! {
        /// ADD wraps modulo 2^16 and flags the carry in E.
        #[test]
        fn prop_add_wraps_and_sets_carry(ac in any::<u16>(), operand in any::<u16>()) {
            let lines = vec!["ADD 2".to_string(), "HAL".to_string(), operand.to_string()];
            let cpu = run(&lines, ac);

            let sum = u32::from(ac) + u32::from(operand);
            prop_assert_eq!(u32::from(cpu.registers().ac), sum % 65536);
            prop_assert_eq!(cpu.registers().e, sum > 65535);
        }

        /// INA behaves like ADD of one.
        #[test]
        fn prop_ina_increments(ac in any::<u16>()) {
            let lines = vec!["INA".to_string(), "HAL".to_string()];
            let cpu = run(&lines, ac);

            prop_assert_eq!(cpu.registers().ac, ac.wrapping_add(1));
            prop_assert_eq!(cpu.registers().e, ac == u16::MAX);
        }

        /// SUB wraps and leaves E alone.
        #[test]
        fn prop_sub_wraps(ac in any::<u16>(), operand in any::<u16>()) {
            let lines = vec!["SUB 2".to_string(), "HAL".to_string(), operand.to_string()];
            let cpu = run(&lines, ac);

            prop_assert_eq!(cpu.registers().ac, ac.wrapping_sub(operand));
            prop_assert!(!cpu.registers().e);
        }

        /// DIV truncates for any non-zero divisor.
        #[test]
        fn prop_div_truncates(ac in any::<u16>(), divisor in 1u16..=u16::MAX) {
            let lines = vec!["DIV 2".to_string(), "HAL".to_string(), divisor.to_string()];
            let cpu = run(&lines, ac);

            prop_assert_eq!(cpu.registers().ac, ac / divisor);
        }

        /// Left rotations undone by as many right rotations restore AC.
        #[test]
        fn prop_rotation_roundtrip(ac in any::<u16>(), lefts in 0usize..16) {
            let mut lines = vec!["CLA".to_string(); lefts];
            lines.extend(vec!["CRA".to_string(); lefts]);
            lines.push("HAL".to_string());
            let cpu = run(&lines, ac);

            prop_assert_eq!(cpu.registers().ac, ac);
        }

        /// Sixteen CLA then sixteen CRA restore AC.
        ///
        /// Both halves do not fit in memory together, so the second program is
        /// loaded over the first; loading keeps the registers.
        #[test]
        fn prop_full_rotation_roundtrip(ac in any::<u16>()) {
            let mut lefts = vec!["CLA".to_string(); 16];
            lefts.push("HAL".to_string());
            let mut cpu = run(&lefts, ac);
            prop_assert_eq!(cpu.registers().ac, ac);
            prop_assert_eq!(cpu.registers().pc, 16);

            // PC is still on slot 16, which now jumps back to the rotations
            let mut rights = vec!["CRA".to_string(); 16];
            rights.push("JMP 0".to_string());
            cpu.load(&program(&rights)).unwrap();
            prop_assert_eq!(cpu.run_limited(17).unwrap(), 17);
            prop_assert_eq!(cpu.registers().ac, ac);
        }

        /// CTA twice is the identity.
        #[test]
        fn prop_complement_involution(ac in any::<u16>()) {
            let lines = vec!["CTA".to_string(), "CTA".to_string(), "HAL".to_string()];
            let cpu = run(&lines, ac);

            prop_assert_eq!(cpu.registers().ac, ac);
        }
    }

    // ========================================================================
    // Memory
    // ========================================================================

    proptest! {
        /// STR then LDA of the same slot reproduces AC.
        #[test]
        fn prop_store_then_load(ac in any::<u16>(), slot in 4usize..MEMORY_SIZE) {
            let lines = vec![
                format!("STR {}", slot),
                "CLR".to_string(),
                format!("LDA {}", slot),
                "HAL".to_string(),
            ];
            let cpu = run(&lines, ac);

            prop_assert_eq!(cpu.registers().ac, ac);
            prop_assert_eq!(cpu.memory().read(slot).unwrap(), &Word::Data(ac));
        }

        /// Data literals are stored modulo 2^16.
        #[test]
        fn prop_literal_wraps(value in -200_000i64..200_000) {
            let expected = value.rem_euclid(65536) as u16;
            prop_assert_eq!(Word::parse(&value.to_string()), Word::Data(expected));
        }

        /// Image text written for any memory parses back to the same memory.
        #[test]
        fn prop_image_text_preserves_memory(
            values in prop::collection::vec(prop::option::of(any::<u16>()), MEMORY_SIZE),
        ) {
            let words: Vec<Word> = values
                .iter()
                .map(|v| v.map_or(Word::Empty, Word::Data))
                .collect();

            let text = image::format_image(&words);
            prop_assert_eq!(parse_image(&text).words, words);
        }

        /// Any sequence of steps leaves PC inside memory.
        #[test]
        fn prop_pc_stays_in_range(ops in prop::collection::vec(0usize..6, 1..20)) {
            const OPS: [&str; 6] = ["INA", "CLA", "CTA", "SKZ", "SKN", "CLR"];
            let mut lines: Vec<String> = ops.iter().map(|&i| OPS[i].to_string()).collect();
            lines.push("HAL".to_string());

            let mut cpu = Cpu::new();
            cpu.load(&program(&lines)).unwrap();
            while cpu.step().is_ok() {
                prop_assert!(cpu.registers().pc < MEMORY_SIZE);
            }
        }
    }
}
