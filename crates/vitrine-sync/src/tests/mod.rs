mod coordination_test;
